//! Error types for the centurywatch runner.
//!
//! Uses `thiserror` for typed errors covering everything that can stop a
//! run before the report is published: configuration, the state directory
//! lock, HTTP client setup, credential checks and report composition.
//! Per-statistic fetch and storage faults never reach this level; the
//! registry absorbs them.

use centurywatch_core::config::ConfigError;
use centurywatch_core::publish::PublishFailure;
use centurywatch_core::run::RunError;
use centurywatch_store::StorageError;

/// Errors that abort a runner invocation.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The configuration file is missing, malformed or invalid.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Environment-supplied settings are missing or malformed.
    #[error("environment error: {0}")]
    Env(String),

    /// The state directory could not be opened or locked.
    #[error("state error: {0}")]
    Storage(#[from] StorageError),

    /// An HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// Credential verification failed before posting.
    #[error("credential check failed: {0}")]
    Credentials(PublishFailure),

    /// The run could not compose a report.
    #[error("run error: {0}")]
    Run(#[from] RunError),
}
