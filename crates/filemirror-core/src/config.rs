//! Configuration module for filemirror.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.
//! Command-line flags are applied on top of the loaded file by the daemon.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::identity::KeyScheme;
use crate::ports::copier::CopyMode;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for filemirror.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

/// Mirroring settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Directory tree scanned for files to mirror.
    pub source_dir: PathBuf,
    /// Flat directory that receives the mirrored copies.
    pub target_dir: PathBuf,
    /// Identity-key prefixes a source file must match. Empty admits all.
    pub key_prefixes: Vec<String>,
    /// Exact base name of the files being mirrored.
    pub target_file_name: String,
    /// Seconds a first-seen file may have been idle and still be copied.
    /// `None` disables the age filter.
    pub copy_expire_secs: Option<u64>,
    /// Seconds a mirrored copy must be idle before it is deleted.
    pub delete_expire_secs: u64,
    /// Seconds to sleep between cycles.
    pub tick_interval_secs: u64,
    /// Seconds between rebuilds of the state map from the target directory.
    /// `None` rebuilds on every cycle.
    pub refresh_interval_secs: Option<u64>,
    /// How grown files are brought up to date.
    pub copy_mode: CopyMode,
    /// How identity keys are derived.
    pub key_scheme: KeyScheme,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Directory holding the log files.
    pub directory: PathBuf,
    /// Base name of the log file; rotated files get a date suffix.
    pub file_name: String,
    /// Maximum number of rotated log files to keep.
    pub max_files: usize,
    /// Emit JSON lines instead of human-readable text.
    pub json: bool,
    /// Echo every log line to stdout as well as the log file.
    pub stdout: bool,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/filemirror/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("filemirror")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Default base name of mirrored files.
pub const DEFAULT_TARGET_FILE_NAME: &str = "application.log";

/// Default log file name.
pub const DEFAULT_LOG_FILE_NAME: &str = "run.log";

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::new(),
            target_dir: PathBuf::new(),
            key_prefixes: Vec::new(),
            target_file_name: DEFAULT_TARGET_FILE_NAME.to_string(),
            copy_expire_secs: Some(60 * 60),
            delete_expire_secs: 3 * 60 * 60,
            tick_interval_secs: 1,
            refresh_interval_secs: None,
            copy_mode: CopyMode::default(),
            key_scheme: KeyScheme::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: PathBuf::from("logs"),
            file_name: DEFAULT_LOG_FILE_NAME.to_string(),
            max_files: 10,
            json: false,
            stdout: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.tick_interval_secs"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Upper bound for expiry windows: 100 years.
pub const MAX_EXPIRE_SECS: u64 = 100 * 365 * 24 * 60 * 60;

fn expire_too_large(field: &str) -> ValidationError {
    ValidationError {
        field: field.into(),
        message: format!("must not exceed {MAX_EXPIRE_SECS} seconds (100 years)"),
    }
}

fn check_directory(errors: &mut Vec<ValidationError>, field: &str, path: &Path) {
    if path.as_os_str().is_empty() {
        errors.push(ValidationError {
            field: field.into(),
            message: "must be set".into(),
        });
    } else if !path.is_dir() {
        errors.push(ValidationError {
            field: field.into(),
            message: format!("directory does not exist: {}", path.display()),
        });
    }
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- sync ---
        check_directory(&mut errors, "sync.source_dir", &self.sync.source_dir);
        check_directory(&mut errors, "sync.target_dir", &self.sync.target_dir);

        if !self.sync.source_dir.as_os_str().is_empty()
            && self.sync.source_dir == self.sync.target_dir
        {
            errors.push(ValidationError {
                field: "sync.target_dir".into(),
                message: "must differ from sync.source_dir".into(),
            });
        }

        if self.sync.target_file_name.is_empty() {
            errors.push(ValidationError {
                field: "sync.target_file_name".into(),
                message: "must not be empty".into(),
            });
        } else if self.sync.target_file_name.contains('/') {
            errors.push(ValidationError {
                field: "sync.target_file_name".into(),
                message: "must be a base name, not a path".into(),
            });
        }

        match self.sync.copy_expire_secs {
            Some(0) => errors.push(ValidationError {
                field: "sync.copy_expire_secs".into(),
                message: "must be greater than 0 (omit it to disable the filter)".into(),
            }),
            Some(secs) if secs > MAX_EXPIRE_SECS => {
                errors.push(expire_too_large("sync.copy_expire_secs"))
            }
            _ => {}
        }
        if self.sync.delete_expire_secs == 0 {
            errors.push(ValidationError {
                field: "sync.delete_expire_secs".into(),
                message: "must be greater than 0".into(),
            });
        } else if self.sync.delete_expire_secs > MAX_EXPIRE_SECS {
            errors.push(expire_too_large("sync.delete_expire_secs"));
        }
        if self.sync.tick_interval_secs == 0 {
            errors.push(ValidationError {
                field: "sync.tick_interval_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.sync.refresh_interval_secs == Some(0) {
            errors.push(ValidationError {
                field: "sync.refresh_interval_secs".into(),
                message: "must be greater than 0 (omit it to refresh every cycle)".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }
        if self.logging.file_name.is_empty() {
            errors.push(ValidationError {
                field: "logging.file_name".into(),
                message: "must not be empty".into(),
            });
        }
        if self.logging.max_files == 0 {
            errors.push(ValidationError {
                field: "logging.max_files".into(),
                message: "must be greater than 0".into(),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use filemirror_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .sync_source_dir(PathBuf::from("/var/log/apps"))
///     .sync_target_dir(PathBuf::from("/srv/mirror"))
///     .sync_key_prefixes(vec!["order".to_string()])
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Start from an existing configuration, e.g. one loaded from disk.
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    // --- sync ---

    pub fn sync_source_dir(mut self, dir: PathBuf) -> Self {
        self.config.sync.source_dir = dir;
        self
    }

    pub fn sync_target_dir(mut self, dir: PathBuf) -> Self {
        self.config.sync.target_dir = dir;
        self
    }

    pub fn sync_key_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.config.sync.key_prefixes = prefixes;
        self
    }

    pub fn sync_target_file_name(mut self, name: impl Into<String>) -> Self {
        self.config.sync.target_file_name = name.into();
        self
    }

    pub fn sync_copy_expire_secs(mut self, seconds: Option<u64>) -> Self {
        self.config.sync.copy_expire_secs = seconds;
        self
    }

    pub fn sync_delete_expire_secs(mut self, seconds: u64) -> Self {
        self.config.sync.delete_expire_secs = seconds;
        self
    }

    pub fn sync_tick_interval_secs(mut self, seconds: u64) -> Self {
        self.config.sync.tick_interval_secs = seconds;
        self
    }

    pub fn sync_refresh_interval_secs(mut self, seconds: Option<u64>) -> Self {
        self.config.sync.refresh_interval_secs = seconds;
        self
    }

    pub fn sync_copy_mode(mut self, mode: CopyMode) -> Self {
        self.config.sync.copy_mode = mode;
        self
    }

    pub fn sync_key_scheme(mut self, scheme: KeyScheme) -> Self {
        self.config.sync.key_scheme = scheme;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_directory(mut self, dir: PathBuf) -> Self {
        self.config.logging.directory = dir;
        self
    }

    pub fn logging_file_name(mut self, name: impl Into<String>) -> Self {
        self.config.logging.file_name = name.into();
        self
    }

    pub fn logging_max_files(mut self, n: usize) -> Self {
        self.config.logging.max_files = n;
        self
    }

    pub fn logging_json(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    pub fn logging_stdout(mut self, stdout: bool) -> Self {
        self.config.logging.stdout = stdout;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
