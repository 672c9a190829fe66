//! Publisher trait and an in-memory implementation.
//!
//! Publishing is the last step of a run, after all state has been
//! committed, so a failure here never corrupts anything: it is reported to
//! the invoker and not retried within the run.

use std::future::Future;
use std::sync::{Mutex, PoisonError};

/// Reasons a report could not be published.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishFailure {
    /// The text exceeds the platform's length limit.
    #[error("post is {chars} characters, limit is {max}")]
    TooLong {
        /// Length of the rejected text in characters.
        chars: usize,
        /// The configured limit.
        max: usize,
    },

    /// Credentials are missing or were rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The platform answered with a non-success status.
    #[error("post rejected with HTTP {status}: {body}")]
    Rejected {
        /// The HTTP status code.
        status: u16,
        /// The response body, for diagnosis.
        body: String,
    },

    /// The request could not be delivered.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Acknowledgement of a successful publish.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReceipt {
    /// Platform identifier of the created post, when the platform returns one.
    pub post_id: Option<String>,
}

/// Destination for composed reports.
pub trait Publisher {
    /// Human-readable name for logging.
    fn name(&self) -> &'static str;

    /// Publish exactly one composed report.
    fn publish(&self, text: &str)
    -> impl Future<Output = Result<PublishReceipt, PublishFailure>> + Send;
}

/// Publisher that keeps every post in memory.
///
/// Optionally fails every publish with a preset [`PublishFailure`].
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    posts: Mutex<Vec<String>>,
    failure: Option<PublishFailure>,
}

impl RecordingPublisher {
    /// A publisher that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// A publisher that rejects every post with `failure`.
    pub fn failing(failure: PublishFailure) -> Self {
        Self {
            posts: Mutex::new(Vec::new()),
            failure: Some(failure),
        }
    }

    /// All successfully published posts, oldest first.
    pub fn posts(&self) -> Vec<String> {
        self.posts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Publisher for RecordingPublisher {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn publish(&self, text: &str) -> Result<PublishReceipt, PublishFailure> {
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        let mut posts = self.posts.lock().unwrap_or_else(PoisonError::into_inner);
        posts.push(text.to_owned());
        Ok(PublishReceipt {
            post_id: Some(posts.len().to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_publisher_keeps_posts() {
        let publisher = RecordingPublisher::new();
        let receipt = publisher.publish("hello").await;
        assert_eq!(receipt.ok().and_then(|r| r.post_id).as_deref(), Some("1"));
        assert_eq!(publisher.posts(), vec!["hello".to_owned()]);
    }

    #[tokio::test]
    async fn failing_publisher_records_nothing() {
        let publisher = RecordingPublisher::failing(PublishFailure::Transport("down".into()));
        assert!(publisher.publish("hello").await.is_err());
        assert!(publisher.posts().is_empty());
    }

    #[test]
    fn failure_display() {
        let err = PublishFailure::TooLong { chars: 301, max: 280 };
        assert_eq!(err.to_string(), "post is 301 characters, limit is 280");
    }
}
