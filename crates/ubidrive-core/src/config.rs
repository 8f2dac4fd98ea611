//! Configuration module for UbiDrive.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Top-level configuration for UbiDrive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub sync: SyncConfig,
    pub conflicts: ConflictsConfig,
    pub logging: LoggingConfig,
}

/// What to do when an operation is requested on a file that already has
/// one in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingPolicy {
    /// Reject the new request with a busy error.
    #[default]
    Reject,
    /// Queue the new request until the in-flight operation finishes.
    Queue,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Remote container subdirectory holding synchronized documents.
    pub documents_dir: String,
    /// Local directory for offline copies awaiting upload.
    pub offline_dir: PathBuf,
    /// Seconds between remote metadata polling cycles.
    pub poll_interval: u64,
    /// Milliseconds to wait after a metadata change before emitting it (debounce).
    pub debounce_delay_ms: u64,
    /// Modification dates closer than this are treated as simultaneous.
    pub date_tolerance_ms: u64,
    /// Restrict watching to files with this extension; `None` watches all.
    pub file_extension: Option<String>,
    /// Whether hidden files (leading dot) take part in reconciliation.
    pub sync_hidden_files: bool,
    /// Whether newly listed remote files are downloaded automatically.
    pub auto_download: bool,
    /// How to handle a request on a file that is already busy.
    pub pending_policy: PendingPolicy,
}

/// Conflict resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictsConfig {
    /// Default conflict strategy: `latest_wins` or `manual`.
    pub default_strategy: String,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Path to the log file.
    pub file: PathBuf,
}

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Using default configuration");
                Self::default()
            }
        }
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/ubidrive/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("ubidrive")
            .join("config.yaml")
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            documents_dir: "Documents".to_string(),
            offline_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("ubidrive")
                .join("offline"),
            poll_interval: 30,
            debounce_delay_ms: 500,
            date_tolerance_ms: 1000,
            file_extension: None,
            sync_hidden_files: false,
            auto_download: true,
            pending_policy: PendingPolicy::Reject,
        }
    }
}

impl Default for ConflictsConfig {
    fn default() -> Self {
        Self {
            default_strategy: "latest_wins".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("ubidrive");
        Self {
            level: "info".to_string(),
            file: data_dir.join("ubidrive.log"),
        }
    }
}

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.poll_interval"`.
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

/// Valid values for `conflicts.default_strategy`.
const VALID_CONFLICT_STRATEGIES: &[&str] = &["latest_wins", "manual"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- sync ---
        if self.sync.documents_dir.is_empty() {
            errors.push(ValidationError {
                field: "sync.documents_dir".into(),
                message: "must not be empty".into(),
            });
        }
        if self.sync.documents_dir.starts_with('/') {
            errors.push(ValidationError {
                field: "sync.documents_dir".into(),
                message: "must be relative to the container root".into(),
            });
        }
        if self.sync.poll_interval == 0 {
            errors.push(ValidationError {
                field: "sync.poll_interval".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.sync.debounce_delay_ms == 0 {
            errors.push(ValidationError {
                field: "sync.debounce_delay_ms".into(),
                message: "must be greater than 0".into(),
            });
        }
        if let Some(ext) = &self.sync.file_extension {
            if ext.is_empty() || ext.starts_with('.') {
                errors.push(ValidationError {
                    field: "sync.file_extension".into(),
                    message: "must be a bare extension without the leading dot".into(),
                });
            }
        }

        // --- conflicts ---
        if !VALID_CONFLICT_STRATEGIES.contains(&self.conflicts.default_strategy.as_str()) {
            errors.push(ValidationError {
                field: "conflicts.default_strategy".into(),
                message: format!(
                    "invalid strategy '{}'; valid options: {}",
                    self.conflicts.default_strategy,
                    VALID_CONFLICT_STRATEGIES.join(", ")
                ),
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

        errors
    }
}

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use ubidrive_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .sync_documents_dir("Notes")
///     .sync_poll_interval(60)
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

    // --- sync ---

    pub fn sync_documents_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.sync.documents_dir = dir.into();
        self
    }

    pub fn sync_offline_dir(mut self, dir: PathBuf) -> Self {
        self.config.sync.offline_dir = dir;
        self
    }

    pub fn sync_poll_interval(mut self, seconds: u64) -> Self {
        self.config.sync.poll_interval = seconds;
        self
    }

    pub fn sync_debounce_delay_ms(mut self, millis: u64) -> Self {
        self.config.sync.debounce_delay_ms = millis;
        self
    }

    pub fn sync_date_tolerance_ms(mut self, millis: u64) -> Self {
        self.config.sync.date_tolerance_ms = millis;
        self
    }

    pub fn sync_file_extension(mut self, extension: impl Into<String>) -> Self {
        self.config.sync.file_extension = Some(extension.into());
        self
    }

    pub fn sync_hidden_files(mut self, include: bool) -> Self {
        self.config.sync.sync_hidden_files = include;
        self
    }

    pub fn sync_auto_download(mut self, enabled: bool) -> Self {
        self.config.sync.auto_download = enabled;
        self
    }

    pub fn sync_pending_policy(mut self, policy: PendingPolicy) -> Self {
        self.config.sync.pending_policy = policy;
        self
    }

    // --- conflicts ---

    pub fn conflicts_default_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.config.conflicts.default_strategy = strategy.into();
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_file(mut self, file: PathBuf) -> Self {
        self.config.logging.file = file;
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
