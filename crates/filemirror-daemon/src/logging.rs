//! Logging setup for the daemon.
//!
//! Installs a global tracing subscriber that writes to a daily-rotated file
//! under `logging.directory`, echoing to stdout only when asked. Old files
//! beyond `logging.max_files` are removed by the appender itself.

use std::path::PathBuf;

use filemirror_core::config::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

/// Errors that may occur while initializing logging.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// Failed to create the log directory.
    #[error("Failed to prepare log directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The rolling file appender could not be built.
    #[error("Failed to create log file appender: {0}")]
    Appender(#[from] InitError),
    /// A global subscriber was already installed.
    #[error("Failed to install global tracing subscriber: {0}")]
    SetGlobal(#[from] TryInitError),
}

/// Keeps the background log writer alive; flushes on drop.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _worker: WorkerGuard,
}

/// Filter directive for a configured level and `-v` count.
///
/// Each `-v` raises verbosity one step above the configured level.
pub fn effective_level(configured: &str, verbose: u8) -> &str {
    match verbose {
        0 => configured,
        1 => "debug",
        _ => "trace",
    }
}

/// Whether log lines are echoed to stdout: `logging.stdout` or any `-v`.
pub fn echo_stdout(config: &LoggingConfig, verbose: u8) -> bool {
    config.stdout || verbose > 0
}

fn build_env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Initialize tracing to write to the rotating log file, plus stdout when
/// `stdout` is set.
///
/// `RUST_LOG`, when set, takes precedence over `level`.
pub fn init(
    config: &LoggingConfig,
    level: &str,
    stdout: bool,
) -> Result<LoggingGuard, LoggingError> {
    std::fs::create_dir_all(&config.directory).map_err(|source| LoggingError::CreateDir {
        path: config.directory.clone(),
        source,
    })?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(config.file_name.as_str())
        .max_log_files(config.max_files)
        .build(&config.directory)?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let stdout_layer =
        stdout.then(|| fmt::layer().with_target(true).with_writer(std::io::stdout));

    let (json_file, text_file) = if config.json {
        (
            Some(fmt::layer().with_ansi(false).with_writer(file_writer).json()),
            None,
        )
    } else {
        (
            None,
            Some(fmt::layer().with_ansi(false).with_writer(file_writer)),
        )
    };

    Registry::default()
        .with(build_env_filter(level))
        .with(stdout_layer)
        .with(json_file)
        .with(text_file)
        .try_init()?;

    tracing::info!(
        directory = %config.directory.display(),
        file = %config.file_name,
        json = config.json,
        stdout,
        "Logging initialized"
    );

    Ok(LoggingGuard { _worker: guard })
}
