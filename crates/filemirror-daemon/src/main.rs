//! filemirror daemon - background log mirroring service
//!
//! This binary runs as a long-lived service and:
//! - Mirrors growing files from a source tree into a flat target directory
//! - Removes mirrors once they have been idle past the delete window
//! - Shuts down gracefully on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! Configuration comes from the YAML file and is overridden by command-line
//! flags. The daemon then builds a `SyncEngine` and hands it to a
//! `CycleScheduler`, whose loop is controlled by a `CancellationToken` that
//! is triggered on receipt of SIGTERM or SIGINT.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use filemirror_core::config::{Config, ConfigBuilder};
use filemirror_sync::{
    copier::FileCopier,
    engine::{EngineSettings, SyncEngine},
    scheduler::CycleScheduler,
    state::{RefreshPolicy, StateMap},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod logging;

// ============================================================================
// Command line
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "filemirrord",
    version,
    about = "Mirror growing log files into a flat directory"
)]
struct Cli {
    /// Directory tree to scan for files to mirror
    #[arg(long, alias = "source_dir")]
    source_dir: Option<PathBuf>,

    /// Flat directory that receives the mirrors
    #[arg(long, alias = "target_dir")]
    target_dir: Option<PathBuf>,

    /// Comma-separated identity-key prefixes to mirror (empty mirrors all)
    #[arg(long, alias = "file_key_pats")]
    file_key_pats: Option<String>,

    /// Log file name inside the log directory
    #[arg(long, alias = "log_name")]
    log_name: Option<String>,

    /// Use alternate config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Split a comma-separated prefix list, dropping blanks.
fn parse_key_prefixes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

/// Load the config file and apply command-line overrides.
///
/// An explicit `--config` must load; the default path falls back to
/// built-in defaults when absent.
fn resolve_config(cli: &Cli) -> Result<Config> {
    let base = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::load_or_default(&Config::default_path()),
    };

    let mut builder = ConfigBuilder::from_config(base);
    if let Some(dir) = &cli.source_dir {
        builder = builder.sync_source_dir(dir.clone());
    }
    if let Some(dir) = &cli.target_dir {
        builder = builder.sync_target_dir(dir.clone());
    }
    if let Some(pats) = &cli.file_key_pats {
        builder = builder.sync_key_prefixes(parse_key_prefixes(pats));
    }
    if let Some(name) = &cli.log_name {
        builder = builder.logging_file_name(name.as_str());
    }
    Ok(builder.build())
}

fn print_banner(config: &Config) {
    println!(
        "==================== filemirrord {} ====================",
        env!("CARGO_PKG_VERSION")
    );
    println!("source_dir = {}", config.sync.source_dir.display());
    println!("target_dir = {}", config.sync.target_dir.display());
    println!("file_key_pats = {:?}", config.sync.key_prefixes);
    println!("log_name = {}", config.logging.file_name);
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    let errors = config.validate();
    if !errors.is_empty() {
        eprintln!("Parse args failed.");
        for e in &errors {
            eprintln!("  {e}");
        }
        let _ = Cli::command().print_help();
        std::process::exit(1);
    }

    print_banner(&config);

    let level = logging::effective_level(&config.logging.level, cli.verbose);
    let echo = logging::echo_stdout(&config.logging, cli.verbose);
    let _log_guard =
        logging::init(&config.logging, level, echo).context("Failed to initialize logging")?;

    info!(
        source_dir = %config.sync.source_dir.display(),
        target_dir = %config.sync.target_dir.display(),
        prefixes = ?config.sync.key_prefixes,
        mode = %config.sync.copy_mode,
        "File-Sync start"
    );

    // Cancellation token propagated to the scheduler
    let shutdown_token = CancellationToken::new();

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let state = Arc::new(StateMap::new());
    let engine = SyncEngine::new(
        EngineSettings::from_config(&config),
        Arc::clone(&state),
        Arc::new(FileCopier::new(config.sync.copy_mode)),
        RefreshPolicy::from_secs(config.sync.refresh_interval_secs),
    );

    let mut scheduler =
        CycleScheduler::new(engine, Duration::from_secs(config.sync.tick_interval_secs));
    scheduler.run(shutdown_token).await;

    info!(
        cycles = scheduler.cycles_completed(),
        tracked = state.len(),
        "File-Sync end"
    );
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
