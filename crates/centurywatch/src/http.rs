//! Shared HTTP client construction.
//!
//! Source pages are fetched with a browser-like User-Agent, rotated per
//! client, unless the configuration pins one.

use std::time::Duration;

use rand::seq::IndexedRandom;

use crate::error::AppError;

/// Browser User-Agent strings used when none is configured.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
];

/// Identifies the posting client, and stands in if the rotation list is empty.
const DEFAULT_USER_AGENT: &str = concat!("centurywatch/", env!("CARGO_PKG_VERSION"));

/// Build a client for fetching source pages.
///
/// The per-request `timeout` is a backstop; the registry applies its own
/// bound around each fetch.
pub fn build_client(
    user_agent: Option<&str>,
    timeout: Duration,
) -> Result<reqwest::Client, AppError> {
    let ua = user_agent.map_or_else(|| random_user_agent().to_owned(), ToOwned::to_owned);

    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(ua)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| AppError::HttpClient(format!("failed to build HTTP client: {e}")))
}

/// Build a client for the posting API, identified as centurywatch.
pub fn api_client(timeout: Duration) -> Result<reqwest::Client, AppError> {
    build_client(Some(DEFAULT_USER_AGENT), timeout)
}

/// Pick a User-Agent from the rotation list.
pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(DEFAULT_USER_AGENT)
}
