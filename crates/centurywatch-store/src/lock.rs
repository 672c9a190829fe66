//! Single-writer lock over a state directory.
//!
//! Two runs must never reconcile the same statistic at the same time. The
//! runner takes a [`StateLock`] before touching any record. The lock is an
//! OS advisory exclusive lock on a file in the state directory, held for as
//! long as the guard keeps the file open. The OS drops it when the process
//! exits, so a crashed run never leaves the directory locked.
//!
//! The lock file itself is never deleted: removing it would let a later
//! run lock a fresh inode while an older holder still owns the old one.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use fs2::FileExt;

use crate::error::StorageError;

/// Name of the lock file inside the state directory.
pub const LOCK_FILE_NAME: &str = ".centurywatch.lock";

/// Exclusive ownership of a state directory, released on drop.
#[derive(Debug)]
pub struct StateLock {
    path: PathBuf,
    file: File,
}

impl StateLock {
    /// Acquire the lock for `dir` without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Locked`] if another run holds the lock, or
    /// [`StorageError::Io`] if the lock file cannot be opened or locked.
    pub fn acquire(dir: &Path) -> Result<Self, StorageError> {
        let path = dir.join(LOCK_FILE_NAME);
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| StorageError::io(&path, e))?;

        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::WouldBlock || is_contended(&e) => {
                let holder = fs::read_to_string(&path)
                    .map(|s| s.trim().to_owned())
                    .ok()
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| "unknown holder".to_owned());
                return Err(StorageError::Locked { path, holder });
            }
            Err(e) => return Err(StorageError::io(path, e)),
        }

        // Holder line is informational only; the OS lock is what excludes.
        let holder = format!("pid={} acquired_at={}", std::process::id(), Utc::now().to_rfc3339());
        file.set_len(0)
            .and_then(|()| file.write_all(holder.as_bytes()))
            .and_then(|()| file.sync_all())
            .map_err(|e| StorageError::io(&path, e))?;

        tracing::debug!(path = %path.display(), "Acquired state lock");
        Ok(Self { path, file })
    }

    /// Path of the held lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        match FileExt::unlock(&self.file) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Released state lock"),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to release state lock"
                );
            }
        }
    }
}

/// `try_lock_exclusive` reports contention as `WouldBlock` on unix but as
/// `ERROR_LOCK_VIOLATION` on Windows.
fn is_contended(e: &std::io::Error) -> bool {
    e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_while_held() {
        let dir = tempfile::tempdir().expect("tempdir");
        let _first = StateLock::acquire(dir.path()).unwrap();

        match StateLock::acquire(dir.path()) {
            Err(StorageError::Locked { holder, .. }) => assert!(holder.starts_with("pid=")),
            other => panic!("expected Locked, got {other:?}"),
        }
    }

    #[test]
    fn drop_releases_lock_and_keeps_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let lock = StateLock::acquire(dir.path()).unwrap();
        let path = lock.path().to_path_buf();

        drop(lock);
        assert!(path.exists());
        assert!(StateLock::acquire(dir.path()).is_ok());
    }

    #[test]
    fn leftover_lock_file_without_holder_is_not_a_lock() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join(LOCK_FILE_NAME), "pid=1 acquired_at=long ago").unwrap();

        let lock = StateLock::acquire(dir.path()).unwrap();
        let content = fs::read_to_string(lock.path()).unwrap();
        assert!(content.starts_with(&format!("pid={}", std::process::id())));
    }

    #[test]
    fn exclusivity_holds_across_successive_holders() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = StateLock::acquire(dir.path()).unwrap();
        assert!(StateLock::acquire(dir.path()).is_err());

        drop(first);
        let second = StateLock::acquire(dir.path()).unwrap();
        assert!(second.path().exists());
        assert!(matches!(
            StateLock::acquire(dir.path()),
            Err(StorageError::Locked { .. })
        ));
    }
}
