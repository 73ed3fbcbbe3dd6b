//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.opsboard.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cli::OutputFormat;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".opsboard.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Data source settings.
    #[serde(default)]
    pub source: SourceConfig,

    /// Dashboard settings.
    #[serde(default)]
    pub dashboard: DashboardConfig,

    /// Theme settings.
    #[serde(default)]
    pub theme: ThemeConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Report output path; standard output when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,

    /// Report format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// Where entity snapshots come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Local JSON snapshot file. Takes precedence over Supabase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<PathBuf>,

    /// Supabase project URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supabase_url: Option<String>,

    /// Supabase anon key. Prefer the SUPABASE_ANON_KEY environment variable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supabase_key: Option<String>,

    /// Signed-in user's access token. Never read from the config file.
    #[serde(skip)]
    pub access_token: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            snapshot: None,
            supabase_url: None,
            supabase_key: None,
            access_token: None,
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

/// Dashboard settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Range selector: week, month or year. Anything else means week.
    #[serde(default = "default_range")]
    pub default_range: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            default_range: default_range(),
        }
    }
}

fn default_range() -> String {
    "week".to_string()
}

/// Theme settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeConfig {
    /// File holding the user's explicit theme choice.
    #[serde(default = "default_theme_storage")]
    pub storage_path: PathBuf,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            storage_path: default_theme_storage(),
        }
    }
}

fn default_theme_storage() -> PathBuf {
    PathBuf::from("theme-storage.json")
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were actually given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = Some(output.clone());
        }
        if let Some(format) = args.format {
            self.general.format = format;
        }
        if args.verbose {
            self.general.verbose = true;
        }

        if let Some(ref snapshot) = args.snapshot {
            self.source.snapshot = Some(snapshot.clone());
        }
        if let Some(ref url) = args.supabase_url {
            self.source.supabase_url = Some(url.clone());
        }
        if let Some(ref key) = args.supabase_key {
            self.source.supabase_key = Some(key.clone());
        }
        if let Some(ref token) = args.access_token {
            self.source.access_token = Some(token.clone());
        }
        if let Some(timeout) = args.timeout {
            self.source.timeout_seconds = timeout;
        }

        if let Some(ref range) = args.range {
            self.dashboard.default_range = range.clone();
        }

        if let Some(ref path) = args.theme_file {
            self.theme.storage_path = path.clone();
        }
    }

    /// Log level after merging: `--quiet` wins, then verbose from either source.
    pub fn log_level(&self, quiet: bool) -> tracing::Level {
        if quiet {
            tracing::Level::ERROR
        } else if self.general.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
