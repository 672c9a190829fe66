//! Report publishers.
//!
//! Uses enum dispatch so `main` can pick a backend at runtime without
//! boxing the async trait. The X backend talks to the v2 API over HTTP via
//! `reqwest`; the stdout backend is the dry-run path.

use std::io::Write;

use centurywatch_core::config::{PublisherConfig, PublisherKind};
use centurywatch_core::publish::{PublishFailure, PublishReceipt, Publisher};
use serde::Deserialize;

use crate::config::RunnerEnv;
use crate::error::AppError;

// ---------------------------------------------------------------------------
// Unified publisher enum
// ---------------------------------------------------------------------------

/// The publisher selected by configuration.
#[derive(Debug)]
pub enum ReportPublisher {
    /// Post through the X v2 API.
    X(XPublisher),
    /// Print to standard output.
    Stdout(StdoutPublisher),
}

impl ReportPublisher {
    /// Check credentials where the backend has any.
    ///
    /// Returns the authenticated account name for the X backend.
    pub async fn verify_credentials(&self) -> Result<Option<String>, PublishFailure> {
        match self {
            Self::X(x) => x.verify_credentials().await.map(Some),
            Self::Stdout(_) => Ok(None),
        }
    }
}

impl Publisher for ReportPublisher {
    fn name(&self) -> &'static str {
        match self {
            Self::X(x) => x.name(),
            Self::Stdout(s) => s.name(),
        }
    }

    async fn publish(&self, text: &str) -> Result<PublishReceipt, PublishFailure> {
        match self {
            Self::X(x) => x.publish(text).await,
            Self::Stdout(s) => s.publish(text).await,
        }
    }
}

/// Create the configured publisher.
///
/// The X backend needs `X_BEARER_TOKEN` in the environment.
pub fn create_publisher(
    config: &PublisherConfig,
    env: &RunnerEnv,
    client: reqwest::Client,
) -> Result<ReportPublisher, AppError> {
    match config.kind {
        PublisherKind::X => Ok(ReportPublisher::X(XPublisher::new(
            client,
            &config.api_url,
            env.require_bearer_token()?,
            config.max_chars,
        ))),
        PublisherKind::Stdout => Ok(ReportPublisher::Stdout(StdoutPublisher)),
    }
}

// ---------------------------------------------------------------------------
// X v2 API
// ---------------------------------------------------------------------------

/// Publisher for the X (Twitter) v2 API.
///
/// Posts to `{api_url}/2/tweets` with an OAuth 2.0 user-context bearer
/// token.
pub struct XPublisher {
    client: reqwest::Client,
    api_url: String,
    bearer_token: String,
    max_chars: usize,
}

impl std::fmt::Debug for XPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XPublisher")
            .field("api_url", &self.api_url)
            .field("max_chars", &self.max_chars)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct CreatedPost {
    id: String,
}

#[derive(Deserialize)]
struct Account {
    username: String,
}

impl XPublisher {
    /// Create a publisher for `api_url`.
    pub fn new(
        client: reqwest::Client,
        api_url: &str,
        bearer_token: &str,
        max_chars: usize,
    ) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_owned(),
            bearer_token: bearer_token.to_owned(),
            max_chars,
        }
    }

    /// Look up the account the token belongs to.
    pub async fn verify_credentials(&self) -> Result<String, PublishFailure> {
        let url = format!("{}/2/users/me", self.api_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.bearer_token)
            .send()
            .await
            .map_err(|e| PublishFailure::Transport(format!("account lookup failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(PublishFailure::Auth(format!("account lookup returned {status}")));
        }
        if !status.is_success() {
            return Err(rejected(response).await);
        }

        let account: Envelope<Account> = response
            .json()
            .await
            .map_err(|e| PublishFailure::Auth(format!("unexpected account response: {e}")))?;
        Ok(account.data.username)
    }
}

impl Publisher for XPublisher {
    fn name(&self) -> &'static str {
        "x"
    }

    async fn publish(&self, text: &str) -> Result<PublishReceipt, PublishFailure> {
        let chars = text.chars().count();
        if chars > self.max_chars {
            return Err(PublishFailure::TooLong {
                chars,
                max: self.max_chars,
            });
        }

        let url = format!("{}/2/tweets", self.api_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.bearer_token)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .map_err(|e| PublishFailure::Transport(format!("post request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(rejected(response).await);
        }

        // The post exists once the API accepted it; a body we cannot read
        // only loses the id.
        let post_id = match response.json::<Envelope<CreatedPost>>().await {
            Ok(created) => Some(created.data.id),
            Err(e) => {
                tracing::warn!(error = %e, "Post accepted but response body was unreadable");
                None
            }
        };
        Ok(PublishReceipt { post_id })
    }
}

async fn rejected(response: reqwest::Response) -> PublishFailure {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_read_err| "unable to read error body".to_owned());
    PublishFailure::Rejected { status, body }
}

// ---------------------------------------------------------------------------
// Standard output
// ---------------------------------------------------------------------------

/// Dry-run publisher that prints the report.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutPublisher;

impl Publisher for StdoutPublisher {
    fn name(&self) -> &'static str {
        "stdout"
    }

    async fn publish(&self, text: &str) -> Result<PublishReceipt, PublishFailure> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{text}")
            .and_then(|()| stdout.flush())
            .map_err(|e| PublishFailure::Transport(format!("stdout write failed: {e}")))?;
        Ok(PublishReceipt::default())
    }
}
