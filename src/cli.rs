//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

use crate::models::lenient::parse_timestamp;
use crate::models::EntityKind;
use crate::theme::Theme;

/// Opsboard - business-operations dashboard
///
/// Summarize projects, tasks, clients and invoices for a rolling time
/// window. Reads a local JSON snapshot or a hosted Supabase project.
///
/// Examples:
///   opsboard --snapshot data.json
///   opsboard --snapshot data.json --range month --format json -o dashboard.json
///   opsboard --supabase-url https://xyz.supabase.co --range year
///   opsboard --theme toggle
///   opsboard add project name=Website client_id=c-1 budget=12000
///   opsboard update task 42 completed=true
///   opsboard delete invoice 7
///   opsboard --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Change a row on the hosted backend instead of building a report
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Local JSON snapshot with projects, tasks, clients and invoices
    #[arg(short, long, value_name = "FILE")]
    pub snapshot: Option<PathBuf>,

    /// Supabase project URL
    #[arg(long, value_name = "URL", env = "SUPABASE_URL")]
    pub supabase_url: Option<String>,

    /// Supabase anon key
    #[arg(long, value_name = "KEY", env = "SUPABASE_ANON_KEY", hide_env_values = true)]
    pub supabase_key: Option<String>,

    /// Signed-in user's access token (JWT) for row-level security
    #[arg(long, value_name = "TOKEN", env = "OPSBOARD_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Time range for recent activity: week, month or year
    ///
    /// Unrecognized values fall back to week.
    #[arg(short, long, value_name = "RANGE")]
    pub range: Option<String>,

    /// Reference instant (RFC 3339) instead of the current time
    #[arg(long, value_name = "TIMESTAMP")]
    pub now: Option<String>,

    /// Output format (markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Output file path for the report (standard output if omitted)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .opsboard.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Request timeout in seconds for the hosted backend
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Exit with code 2 when any task is overdue
    #[arg(long)]
    pub fail_on_overdue: bool,

    /// Show or change the theme preference instead of building a report
    #[arg(long, value_name = "ACTION")]
    pub theme: Option<ThemeAction>,

    /// Current system color-scheme preference
    #[arg(long, value_name = "THEME", env = "OPSBOARD_SYSTEM_THEME")]
    pub system_theme: Option<Theme>,

    /// File storing the theme preference
    #[arg(long, value_name = "FILE")]
    pub theme_file: Option<PathBuf>,

    /// Generate a default .opsboard.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Row changes sent to the hosted backend.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create a row
    Add {
        /// Kind of row
        entity: EntityKind,

        /// Column values
        #[arg(value_name = "FIELD=VALUE", required = true)]
        fields: Vec<String>,
    },

    /// Change columns of an existing row
    Update {
        /// Kind of row
        entity: EntityKind,

        /// Row id
        id: String,

        /// Column values
        #[arg(value_name = "FIELD=VALUE", required = true)]
        fields: Vec<String>,
    },

    /// Delete a row
    Delete {
        /// Kind of row
        entity: EntityKind,

        /// Row id
        id: String,
    },
}

impl Command {
    pub fn entity(&self) -> EntityKind {
        match self {
            Command::Add { entity, .. }
            | Command::Update { entity, .. }
            | Command::Delete { entity, .. } => *entity,
        }
    }
}

/// Parse `FIELD=VALUE` pairs into a row.
///
/// Values that parse as JSON (`12`, `true`, `null`, `"x"`) keep that type;
/// anything else is taken as a string.
pub fn parse_fields(pairs: &[String]) -> Result<Map<String, Value>, String> {
    let mut row = Map::new();
    for pair in pairs {
        let (field, raw) = pair
            .split_once('=')
            .ok_or_else(|| format!("Expected FIELD=VALUE, got '{}'", pair))?;
        let field = field.trim();
        if field.is_empty() {
            return Err(format!("Missing field name in '{}'", pair));
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::from(raw));
        row.insert(field.to_string(), value);
    }
    Ok(row)
}

/// Theme commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ThemeAction {
    /// Print the effective theme and where it comes from
    Show,
    /// Flip between dark and light and remember the choice
    Toggle,
    /// Remember dark
    Dark,
    /// Remember light
    Light,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref command) = self.command {
            if self.theme.is_some() {
                return Err("Cannot combine --theme with a row change".to_string());
            }
            if let Command::Add { fields, .. } | Command::Update { fields, .. } = command {
                parse_fields(fields)?;
            }
        }

        if let Some(ref url) = self.supabase_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Supabase URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(ref now) = self.now {
            if parse_timestamp(now).is_none() {
                return Err(format!("Invalid --now timestamp: {}", now));
            }
        }

        if let Some(ref snapshot) = self.snapshot {
            if !snapshot.is_file() {
                return Err(format!("Snapshot file does not exist: {}", snapshot.display()));
            }
        }

        Ok(())
    }

    /// Reference instant for the report.
    pub fn reference_instant(&self) -> Option<DateTime<Utc>> {
        self.now.as_deref().and_then(parse_timestamp)
    }
}
