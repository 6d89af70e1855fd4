//! Static-Mirror main entry point
//!
//! This is the command-line interface for the Static-Mirror site exporter.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use static_mirror::archive::artifact_path;
use static_mirror::config::{check_requirements, load_config_with_hash, Config};
use static_mirror::fs::LocalFileSystem;
use static_mirror::output::{export_rows, format_entry, load_statistics, print_statistics};
use static_mirror::storage::open_storage;
use static_mirror::{Action, AppContext, ArchiveManager};
use tracing_subscriber::EnvFilter;

/// Static-Mirror: export a dynamic site as a static copy
///
/// Static-Mirror crawls a site from its homepage, fetches every local page
/// and asset, rewrites links for the new host and packages the result as a
/// zip archive or a directory tree.
#[derive(Parser, Debug)]
#[command(name = "static-mirror")]
#[command(version)]
#[command(about = "Export a dynamic site as a static copy", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the configuration allows a run to start
    Check,

    /// Start a fresh run, discarding any previous one
    Start,

    /// Fetch the next batch, or package once every page is fetched
    Continue,

    /// Cancel the current run
    Cancel,

    /// Start a run and drive it until it finishes
    Run,

    /// List every discovered page as JSON
    Pages,

    /// Show statistics from the database
    Stats,

    /// Print the path of a packaged artifact
    Artifact {
        /// File name of the artifact, e.g. static-mirror-20240301-123005.zip
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::debug!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    match cli.command {
        Command::Check => handle_check(&config),
        Command::Start => handle_action(config, config_hash, Action::Start).await,
        Command::Continue => handle_action(config, config_hash, Action::Continue).await,
        Command::Cancel => handle_action(config, config_hash, Action::Cancel).await,
        Command::Run => handle_run(config, config_hash).await,
        Command::Pages => handle_pages(&config),
        Command::Stats => handle_stats(&config),
        Command::Artifact { name } => {
            println!("{}", artifact_path(&config, &name)?.display());
            Ok(())
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("static_mirror=info,warn"),
            1 => EnvFilter::new("static_mirror=debug,info"),
            2 => EnvFilter::new("static_mirror=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Handles `check`: reports every requirement that blocks a run
fn handle_check(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let report = check_requirements(config, &LocalFileSystem);

    if report.is_empty() {
        println!("✓ Configuration is ready");
        println!("  Origin: {}", config.origin()?);
        println!("  Destination: {}", config.destination_url());
        println!("  Delivery: {}", config.output.delivery_method);
        return Ok(());
    }

    println!("Configuration requirements not met:");
    print!("{}", report);
    Err(report.to_string().into())
}

/// Handles `start`, `continue` and `cancel`: one action, response as JSON
async fn handle_action(
    config: Config,
    config_hash: String,
    action: Action,
) -> Result<(), Box<dyn std::error::Error>> {
    let manager = ArchiveManager::new(AppContext::open(config, Some(config_hash))?);

    let response = manager.perform(action).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);

    Ok(())
}

/// Handles `run`: starts a run and polls `continue` until it finishes
async fn handle_run(config: Config, config_hash: String) -> Result<(), Box<dyn std::error::Error>> {
    let poll_interval = Duration::from_millis(config.crawler.poll_interval_ms);
    let manager = ArchiveManager::new(AppContext::open(config, Some(config_hash))?);

    manager.start()?;

    let mut last_seen = 0;
    loop {
        for entry in manager.status_messages()? {
            if entry.id > last_seen {
                last_seen = entry.id;
                println!("{}", format_entry(&entry));
            }
        }

        if manager.has_finished()? {
            break;
        }

        manager.continue_run().await?;

        if !poll_interval.is_zero() {
            tokio::time::sleep(poll_interval).await;
        }
    }

    let run = manager.run_state()?;
    match run.error_message {
        Some(message) => {
            tracing::error!("Run failed: {}", message);
            Err(message.into())
        }
        None => {
            tracing::info!("Run finished: {}", run.state);
            Ok(())
        }
    }
}

/// Handles `pages`: prints the export listing as JSON
fn handle_pages(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let storage = open_storage(Path::new(&config.output.database_path))?;

    let rows = export_rows(&storage)?;
    println!("{}", serde_json::to_string_pretty(&rows)?);

    Ok(())
}

/// Handles `stats`: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}
