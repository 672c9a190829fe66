//! Marker source trait and stub implementation.
//!
//! For every statistic the registry asks a [`MarkerSource`] for the latest
//! event marker: the start date of the most recent qualifying match. The
//! trait abstracts how that date is obtained. The runner binary scrapes
//! result pages over HTTP; tests use [`StubMarkerSource`].
//!
//! Network and parse problems never escape as panics or opaque errors: they
//! all reduce to a [`FetchFailure`], which the registry recovers from by
//! keeping the previously persisted state.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::NaiveDate;

/// Reasons a marker could not be obtained.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchFailure {
    /// The request could not be sent or the body could not be read.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The source answered with a non-success status.
    #[error("source returned HTTP {status}")]
    Status {
        /// The HTTP status code.
        status: u16,
    },

    /// The page did not have the expected structure.
    #[error("parse error: {0}")]
    Parse(String),

    /// The page parsed but listed no qualifying event.
    #[error("no qualifying event listed")]
    NoMarker,

    /// The fetch did not complete within the configured bound.
    #[error("fetch timed out after {after_ms}ms")]
    Timeout {
        /// The bound that was exceeded, in milliseconds.
        after_ms: u64,
    },
}

/// A source of "latest event marker" dates.
pub trait MarkerSource {
    /// Fetch the start date of the most recent qualifying event listed at
    /// `locator`.
    fn fetch_latest_marker(
        &self,
        locator: &str,
    ) -> impl Future<Output = Result<NaiveDate, FetchFailure>> + Send;
}

/// A scripted marker source keyed by locator.
///
/// Unknown locators answer [`FetchFailure::NoMarker`]. Responses can be
/// changed between runs, and an artificial delay can be added to exercise
/// fetch timeouts.
#[derive(Debug, Default)]
pub struct StubMarkerSource {
    responses: Mutex<BTreeMap<String, Result<NaiveDate, FetchFailure>>>,
    delay: Option<Duration>,
}

impl StubMarkerSource {
    /// Create a stub with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`StubMarkerSource::set_marker`].
    #[must_use]
    pub fn with_marker(self, locator: &str, marker: NaiveDate) -> Self {
        self.set_marker(locator, marker);
        self
    }

    /// Builder form of [`StubMarkerSource::set_failure`].
    #[must_use]
    pub fn with_failure(self, locator: &str, failure: FetchFailure) -> Self {
        self.set_failure(locator, failure);
        self
    }

    /// Delay every response by `delay`.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Answer `marker` for `locator` from now on.
    pub fn set_marker(&self, locator: &str, marker: NaiveDate) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(locator.to_owned(), Ok(marker));
    }

    /// Answer `failure` for `locator` from now on.
    pub fn set_failure(&self, locator: &str, failure: FetchFailure) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(locator.to_owned(), Err(failure));
    }

    fn response(&self, locator: &str) -> Result<NaiveDate, FetchFailure> {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(locator)
            .cloned()
            .unwrap_or(Err(FetchFailure::NoMarker))
    }
}

impl MarkerSource for StubMarkerSource {
    async fn fetch_latest_marker(&self, locator: &str) -> Result<NaiveDate, FetchFailure> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.response(locator)
    }
}
