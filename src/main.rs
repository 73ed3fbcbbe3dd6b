//! Opsboard - business-operations dashboard
//!
//! A CLI that loads projects, tasks, clients and invoices from a local
//! snapshot or a hosted Supabase project and renders the dashboard
//! summary for a rolling time window.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (configuration, data source, output, etc.)
//!   2 - Overdue tasks found with --fail-on-overdue

mod analysis;
mod cli;
mod config;
mod models;
mod report;
mod source;
mod store;
mod theme;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, Command, OutputFormat, ThemeAction};
use config::{Config, CONFIG_FILE};
use indicatif::{ProgressBar, ProgressStyle};
use models::{Entity, EntityKind};
use source::{DataSource, EntityWriter};
use std::time::Duration;
use store::{EntityCache, Store};
use theme::{FileThemeStorage, Theme, ThemeController};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load config before logging so its verbosity applies
    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    // Initialize logging
    init_logging(config.log_level(args.quiet));

    info!("Opsboard v{}", env!("CARGO_PKG_VERSION"));
    debug!(
        "Range: {}, format: {:?}, snapshot: {:?}",
        config.dashboard.default_range, config.general.format, config.source.snapshot
    );

    match run(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Opsboard failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .opsboard.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to set the data source, default range and theme storage.");
    Ok(())
}

/// Initialize logging at the given level.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Dispatch to the requested mode. Returns the process exit code.
async fn run(args: Args, config: Config) -> Result<i32> {
    if let Some(action) = args.theme {
        return handle_theme(action, args.system_theme, &config);
    }

    if let Some(ref command) = args.command {
        return run_command(command, &config).await;
    }

    run_dashboard(&args, &config).await
}

/// Send a row change to the hosted backend and print the stored row.
async fn run_command(command: &Command, config: &Config) -> Result<i32> {
    let writer = source::writer_from_config(&config.source)?;
    info!("Sending {} change to {}", command.entity(), writer.describe());

    let mut store = Store::new();
    let output = match command.entity() {
        EntityKind::Project => apply_change(&mut store.projects, &writer, command).await?,
        EntityKind::Task => apply_change(&mut store.tasks, &writer, command).await?,
        EntityKind::Client => apply_change(&mut store.clients, &writer, command).await?,
        EntityKind::Invoice => apply_change(&mut store.invoices, &writer, command).await?,
    };

    println!("{}", output);
    Ok(0)
}

/// Route one change through the cache of its entity type.
async fn apply_change<T: Entity>(
    cache: &mut EntityCache<T>,
    writer: &dyn EntityWriter,
    command: &Command,
) -> Result<String> {
    match command {
        Command::Add { fields, .. } => {
            let row = cli::parse_fields(fields).map_err(anyhow::Error::msg)?;
            let created = cache
                .create(writer, row)
                .await
                .with_context(|| format!("Failed to create {} row", T::TABLE))?;
            Ok(serde_json::to_string_pretty(&created)?)
        }
        Command::Update { id, fields, .. } => {
            let changes = cli::parse_fields(fields).map_err(anyhow::Error::msg)?;
            let updated = cache
                .update(writer, id, changes)
                .await
                .with_context(|| format!("Failed to update {} row {}", T::TABLE, id))?;
            Ok(serde_json::to_string_pretty(&updated)?)
        }
        Command::Delete { id, .. } => {
            cache
                .remove(writer, id)
                .await
                .with_context(|| format!("Failed to delete {} row {}", T::TABLE, id))?;
            Ok(format!("🗑️  Deleted {} row {}", T::TABLE, id))
        }
    }
}

/// Fetch a snapshot, aggregate it and write the report.
async fn run_dashboard(args: &Args, config: &Config) -> Result<i32> {
    let source = source::from_config(&config.source)?;
    info!("Loading data from {}", source.describe());

    let spinner = (source.is_remote() && !args.quiet).then(|| {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("Fetching from {}", source.describe()));
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    });

    let mut store = Store::new();
    let refreshed = store.refresh(source.as_ref()).await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    refreshed.with_context(|| format!("Failed to load data from {}", source.describe()))?;

    let range_text = config.dashboard.default_range.as_str();
    if !analysis::TimeRange::is_known(range_text) {
        warn!("Unknown range '{}', using week", range_text);
    }
    let range = analysis::TimeRange::from(range_text);
    let now = args.reference_instant().unwrap_or_else(Utc::now);

    let snapshot = store.snapshot();
    if snapshot.is_empty() {
        warn!("No entities loaded from {}", source.describe());
    }
    let summary = analysis::build_summary(&snapshot, range, now);

    let output = match config.general.format {
        OutputFormat::Json => report::generate_json_report(&summary)?,
        OutputFormat::Markdown => report::generate_markdown_report(&summary),
    };

    match config.general.output {
        Some(ref path) => {
            report::generator::write_report(&output, path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;

            if !args.quiet {
                println!("📊 Dashboard ({})", range.label());
                println!(
                    "   Active projects: {} | Clients: {} | Pending tasks: {}",
                    summary.stats.active_projects,
                    summary.stats.total_clients,
                    summary.stats.pending_tasks
                );
                println!(
                    "   Revenue: {} | Overdue: {}",
                    report::format_currency(summary.stats.total_revenue),
                    summary.task_stats.overdue
                );
                println!("\n✅ Report saved to: {}", path.display());
            }
        }
        None => print!("{}", output),
    }

    if args.fail_on_overdue && summary.task_stats.overdue > 0 {
        eprintln!(
            "\n⛔ {} overdue task(s) found. Failing (exit code 2).",
            summary.task_stats.overdue
        );
        return Ok(2);
    }

    Ok(0)
}

/// Handle --theme: show or change the stored preference.
fn handle_theme(action: ThemeAction, system: Option<Theme>, config: &Config) -> Result<i32> {
    let storage = FileThemeStorage::new(&config.theme.storage_path);
    let mut controller = ThemeController::new(storage, None);
    if let Some(system) = system {
        controller.system_changed(system);
    }
    let mut changes = controller.subscribe();

    match action {
        ThemeAction::Show => {}
        ThemeAction::Toggle => {
            controller.toggle().context("Failed to save theme preference")?;
        }
        ThemeAction::Dark => controller
            .set(Theme::Dark)
            .context("Failed to save theme preference")?,
        ThemeAction::Light => controller
            .set(Theme::Light)
            .context("Failed to save theme preference")?,
    }

    if changes.has_changed().unwrap_or(false) {
        info!("Theme switched to {}", *changes.borrow_and_update());
    }
    println!("{} ({})", controller.current(), controller.source());
    Ok(0)
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is set up, so problems go straight to stderr.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("⚠️  Ignoring {}: {:#}", CONFIG_FILE, e);
            Ok(Config::default())
        }
    }
}
