//! Error types for the state store.
//!
//! All failures are reported through [`StorageError`], which carries the
//! path of the record involved so the runner can log which statistic was
//! skipped.

use std::path::PathBuf;

/// Errors that can occur while reading or writing persisted state.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A filesystem operation on a record failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// The file or directory being accessed.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A record exists but does not hold a `YYYY-MM-DD` date.
    #[error("corrupt record {}: {content:?} is not an ISO date", path.display())]
    Corrupt {
        /// The record file.
        path: PathBuf,
        /// The offending (trimmed) file content.
        content: String,
    },

    /// Another writer currently owns this record.
    #[error("record {} is being written by another process", path.display())]
    Contended {
        /// The temporary file that signalled the competing writer.
        path: PathBuf,
    },

    /// The state directory is locked by another run.
    #[error("state directory locked by another run ({holder}): {}", path.display())]
    Locked {
        /// The lock file.
        path: PathBuf,
        /// Contents of the lock file, describing its holder.
        holder: String,
    },

    /// The store refused the operation (in-memory fault injection).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_path() {
        let err = StorageError::io(
            "/var/lib/centurywatch/root_test.marker",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(err.to_string().contains("root_test.marker"));
    }

    #[test]
    fn display_corrupt_shows_content() {
        let err = StorageError::Corrupt {
            path: PathBuf::from("root_test.detected"),
            content: "08/12/2024".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "corrupt record root_test.detected: \"08/12/2024\" is not an ISO date"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StorageError>();
    }
}
