//! Environment-supplied runner settings.
//!
//! Everything about *what* is tracked lives in `centurywatch.yaml`. The
//! environment only says where that file is and carries the posting
//! credential, which is never written to disk.

use std::path::PathBuf;

use crate::error::AppError;

/// Environment variable naming the configuration file.
pub const ENV_CONFIG_PATH: &str = "CENTURYWATCH_CONFIG";

/// Environment variable carrying the OAuth 2.0 user-context bearer token.
pub const ENV_BEARER_TOKEN: &str = "X_BEARER_TOKEN";

/// Configuration file used when [`ENV_CONFIG_PATH`] is unset.
const DEFAULT_CONFIG_PATH: &str = "centurywatch.yaml";

/// Settings read from the process environment.
#[derive(Clone)]
pub struct RunnerEnv {
    /// Path to the YAML configuration file.
    pub config_path: PathBuf,
    /// Posting credential, if provided.
    pub bearer_token: Option<String>,
}

impl std::fmt::Debug for RunnerEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunnerEnv")
            .field("config_path", &self.config_path)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl RunnerEnv {
    /// Load settings from the process environment.
    ///
    /// Optional variables:
    /// - `CENTURYWATCH_CONFIG` -- configuration path (default `centurywatch.yaml`)
    /// - `X_BEARER_TOKEN` -- posting credential, required only for the X publisher
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load settings through an arbitrary lookup function.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let config_path = lookup(ENV_CONFIG_PATH)
            .filter(|p| !p.trim().is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
        let bearer_token = lookup(ENV_BEARER_TOKEN)
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty());

        Self {
            config_path,
            bearer_token,
        }
    }

    /// The bearer token, or an error naming the variable to set.
    pub fn require_bearer_token(&self) -> Result<&str, AppError> {
        self.bearer_token.as_deref().ok_or_else(|| {
            AppError::Env(format!("missing required env var {ENV_BEARER_TOKEN}"))
        })
    }
}
