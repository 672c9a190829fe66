//! Configuration loading and typed config structures.
//!
//! The canonical configuration lives in `centurywatch.yaml`. This module
//! defines strongly-typed structs that mirror the YAML structure and a
//! loader that reads, overrides from the environment, and validates it.
//! The resulting [`WatchConfig`] is built once per run and never mutated
//! afterwards.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use centurywatch_types::StatisticDef;
use serde::Deserialize;

use crate::reconciler::DEFAULT_NOISE_THRESHOLD_DAYS;

/// Environment variable overriding `state.dir`.
pub const ENV_STATE_DIR: &str = "CENTURYWATCH_STATE_DIR";

/// Environment variable forcing the stdout publisher when truthy.
pub const ENV_DRY_RUN: &str = "CENTURYWATCH_DRY_RUN";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but is not usable.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
///
/// Mirrors the structure of `centurywatch.yaml`. Everything except the
/// statistic list has a default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WatchConfig {
    /// The fixed set of tracked statistics, in presentation order.
    #[serde(default)]
    pub statistics: Vec<StatisticDef>,

    /// Reconciliation tuning.
    #[serde(default)]
    pub reconcile: ReconcileConfig,

    /// Source reader settings.
    #[serde(default)]
    pub source: SourceConfig,

    /// Persisted state location.
    #[serde(default)]
    pub state: StateConfig,

    /// Where the composed report goes.
    #[serde(default)]
    pub publisher: PublisherConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl WatchConfig {
    /// Load configuration from a YAML file, apply environment overrides and
    /// validate.
    ///
    /// Environment variables:
    /// - `CENTURYWATCH_STATE_DIR` overrides `state.dir`
    /// - `CENTURYWATCH_DRY_RUN` (`1`/`true`) forces `publisher.kind: stdout`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if it is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// No environment overrides are applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] or [`ConfigError::Invalid`].
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup function.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(ENV_STATE_DIR).filter(|d| !d.trim().is_empty()) {
            self.state.dir = PathBuf::from(dir);
        }
        if lookup(ENV_DRY_RUN).is_some_and(|v| is_truthy(&v)) {
            self.publisher.kind = PublisherKind::Stdout;
        }
    }

    /// Check invariants that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the statistic list is empty,
    /// contains duplicate ids or blank display fields, or a timeout is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.statistics.is_empty() {
            return Err(invalid("at least one statistic must be configured"));
        }

        let mut seen = BTreeSet::new();
        for stat in &self.statistics {
            if !seen.insert(&stat.id) {
                return Err(invalid(format!("duplicate statistic id `{}`", stat.id)));
            }
            if stat.person.trim().is_empty() {
                return Err(invalid(format!("statistic `{}` has an empty person", stat.id)));
            }
            if stat.description.trim().is_empty() {
                return Err(invalid(format!(
                    "statistic `{}` has an empty description",
                    stat.id
                )));
            }
            if stat.source_url.trim().is_empty() {
                return Err(invalid(format!(
                    "statistic `{}` has an empty source_url",
                    stat.id
                )));
            }
        }

        if self.source.fetch_timeout_ms == 0 {
            return Err(invalid("source.fetch_timeout_ms must be at least 1"));
        }
        if self.publisher.max_chars == 0 {
            return Err(invalid("publisher.max_chars must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        reason: reason.into(),
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Reconciliation tuning.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReconcileConfig {
    /// Largest marker shift, in days, still treated as the same event.
    #[serde(default = "default_noise_threshold_days")]
    pub noise_threshold_days: u32,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            noise_threshold_days: default_noise_threshold_days(),
        }
    }
}

/// Source reader configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceConfig {
    /// Upper bound on a single fetch, in milliseconds.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Custom User-Agent; a browser-like default is used when absent.
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Header text of the results-table column holding the marker date.
    #[serde(default = "default_date_column")]
    pub date_column: String,
}

impl SourceConfig {
    /// The fetch timeout as a [`Duration`].
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: default_fetch_timeout_ms(),
            user_agent: None,
            date_column: default_date_column(),
        }
    }
}

/// Persisted state configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StateConfig {
    /// Directory holding one record per (statistic, field).
    #[serde(default = "default_state_dir")]
    pub dir: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            dir: default_state_dir(),
        }
    }
}

/// Which publisher receives the report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublisherKind {
    /// Post through the X (Twitter) v2 API.
    X,
    /// Print to standard output (dry run).
    #[default]
    Stdout,
}

/// Publisher configuration. Credentials are never read from this file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PublisherConfig {
    /// Publisher backend.
    #[serde(default)]
    pub kind: PublisherKind,

    /// Base URL of the posting API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Maximum post length in characters.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    /// Look up the authenticated account before posting.
    #[serde(default = "default_true")]
    pub verify_credentials: bool,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            kind: PublisherKind::default(),
            api_url: default_api_url(),
            max_chars: default_max_chars(),
            verify_credentials: true,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

const fn default_noise_threshold_days() -> u32 {
    DEFAULT_NOISE_THRESHOLD_DAYS
}

const fn default_fetch_timeout_ms() -> u64 {
    15_000
}

fn default_date_column() -> String {
    "Start Date".to_owned()
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("state")
}

fn default_api_url() -> String {
    "https://api.twitter.com".to_owned()
}

const fn default_max_chars() -> usize {
    280
}

const fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_owned()
}
