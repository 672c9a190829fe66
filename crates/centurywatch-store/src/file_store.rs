//! File-backed state store: one small text file per (statistic, field).
//!
//! # Record Layout
//!
//! | File | Content |
//! |------|---------|
//! | `{id}.marker` | Last observed event marker, `YYYY-MM-DD` |
//! | `{id}.detected` | Detection date, `YYYY-MM-DD` |
//! | `.{id}.{field}.tmp` | In-flight write (exclusive, renamed over the record) |
//!
//! Writes go temp file -> `fsync` -> rename -> directory `fsync`, so a reader
//! sees either the old date or the new one, never a torn record. The temp
//! file is created with `create_new`, which makes the writer the sole owner
//! of the record for the duration of the write.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use centurywatch_types::{PersistedState, StateField, StatisticId};
use chrono::NaiveDate;

use crate::StateStore;
use crate::error::StorageError;
use crate::lock::StateLock;

/// Date format of every persisted record.
pub const RECORD_DATE_FORMAT: &str = "%Y-%m-%d";

/// Suffix shared by all in-flight temp files.
const TEMP_SUFFIX: &str = ".tmp";

/// State store rooted at a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    /// Open (creating if needed) the state directory.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;
        tracing::debug!(dir = %dir.display(), "Opened state directory");
        Ok(Self { dir })
    }

    /// The state directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record holding `field` for `statistic`.
    pub fn record_path(&self, statistic: &StatisticId, field: StateField) -> PathBuf {
        self.dir
            .join(format!("{statistic}.{}", field.record_suffix()))
    }

    fn temp_path(&self, statistic: &StatisticId, field: StateField) -> PathBuf {
        self.dir
            .join(format!(".{statistic}.{}{TEMP_SUFFIX}", field.record_suffix()))
    }

    /// Remove temp files left behind by a run that crashed mid-write.
    ///
    /// Requires the directory lock: only with the lock held is it certain
    /// that no other writer owns those files. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the directory cannot be listed or a
    /// stale file cannot be removed.
    pub fn clear_stale_temp_files(&self, _lock: &StateLock) -> Result<usize, StorageError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| StorageError::io(&self.dir, e))?;
        let mut removed: usize = 0;
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::io(&self.dir, e))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') && name.ends_with(TEMP_SUFFIX) {
                let path = entry.path();
                fs::remove_file(&path).map_err(|e| StorageError::io(&path, e))?;
                tracing::warn!(
                    path = %path.display(),
                    "Removed stale temp file from interrupted write"
                );
                removed = removed.saturating_add(1);
            }
        }
        Ok(removed)
    }

    fn read_field(
        &self,
        statistic: &StatisticId,
        field: StateField,
    ) -> Result<Option<NaiveDate>, StorageError> {
        let path = self.record_path(statistic, field);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io(path, e)),
        };
        let trimmed = content.trim();
        NaiveDate::parse_from_str(trimmed, RECORD_DATE_FORMAT)
            .map(Some)
            .map_err(|_parse_err| StorageError::Corrupt {
                path,
                content: trimmed.to_owned(),
            })
    }

    fn write_field(
        &self,
        statistic: &StatisticId,
        field: StateField,
        date: NaiveDate,
    ) -> Result<(), StorageError> {
        let path = self.record_path(statistic, field);
        let tmp_path = self.temp_path(statistic, field);

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StorageError::Contended { path: tmp_path });
            }
            Err(e) => return Err(StorageError::io(tmp_path, e)),
        };

        let body = format!("{}\n", date.format(RECORD_DATE_FORMAT));
        let written = file
            .write_all(body.as_bytes())
            .and_then(|()| file.sync_all());
        drop(file);

        if let Err(e) = written.and_then(|()| fs::rename(&tmp_path, &path)) {
            discard_temp(&tmp_path);
            return Err(StorageError::io(path, e));
        }

        sync_dir(&self.dir)?;
        tracing::debug!(
            statistic = %statistic,
            field = %field,
            date = %date,
            "Persisted state record"
        );
        Ok(())
    }
}

impl StateStore for FileStateStore {
    fn read(&self, statistic: &StatisticId) -> Result<PersistedState, StorageError> {
        Ok(PersistedState {
            last_known_marker: self.read_field(statistic, StateField::Marker)?,
            detection_date: self.read_field(statistic, StateField::Detection)?,
        })
    }

    fn write(
        &self,
        statistic: &StatisticId,
        field: StateField,
        date: NaiveDate,
    ) -> Result<(), StorageError> {
        self.write_field(statistic, field, date)
    }
}

/// Best-effort removal of a temp file after a failed write.
fn discard_temp(tmp_path: &Path) {
    if let Err(e) = fs::remove_file(tmp_path) {
        tracing::warn!(path = %tmp_path.display(), error = %e, "Failed to remove temp file");
    }
}

/// Flush the directory entry so the rename itself survives a crash.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<(), StorageError> {
    fs::File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| StorageError::io(dir, e))
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
const fn sync_dir(_dir: &Path) -> Result<(), StorageError> {
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn id(s: &str) -> StatisticId {
        StatisticId::new(s).unwrap()
    }

    fn open_store() -> (tempfile::TempDir, FileStateStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStateStore::open(dir.path().join("state")).expect("open store");
        (dir, store)
    }

    #[test]
    fn missing_records_read_as_empty_state() {
        let (_dir, store) = open_store();
        let state = store.read(&id("root_test")).unwrap();
        assert!(state.is_empty());
    }

    #[test]
    fn write_then_read_each_field() {
        let (_dir, store) = open_store();
        let stat = id("root_test");

        store.write(&stat, StateField::Marker, date(2024, 12, 5)).unwrap();
        let state = store.read(&stat).unwrap();
        assert_eq!(state.last_known_marker, Some(date(2024, 12, 5)));
        assert_eq!(state.detection_date, None);

        store.write(&stat, StateField::Detection, date(2024, 12, 8)).unwrap();
        let state = store.read(&stat).unwrap();
        assert_eq!(state, PersistedState::recorded(date(2024, 12, 5), date(2024, 12, 8)));
    }

    #[test]
    fn record_is_plain_iso_date() {
        let (_dir, store) = open_store();
        let stat = id("root_odi");
        store.write(&stat, StateField::Marker, date(2019, 6, 14)).unwrap();

        let raw = fs::read_to_string(store.record_path(&stat, StateField::Marker)).unwrap();
        assert_eq!(raw, "2019-06-14\n");
    }

    #[test]
    fn overwrite_replaces_whole_record() {
        let (_dir, store) = open_store();
        let stat = id("stokes_test");
        store.write(&stat, StateField::Marker, date(2023, 7, 2)).unwrap();
        store.write(&stat, StateField::Marker, date(2025, 1, 1)).unwrap();

        let raw = fs::read_to_string(store.record_path(&stat, StateField::Marker)).unwrap();
        assert_eq!(raw, "2025-01-01\n");
        assert!(!store.temp_path(&stat, StateField::Marker).exists());
    }

    #[test]
    fn statistics_do_not_share_records() {
        let (_dir, store) = open_store();
        store.write(&id("root_test"), StateField::Marker, date(2024, 12, 5)).unwrap();
        assert!(store.read(&id("root_odi")).unwrap().is_empty());
    }

    #[test]
    fn tolerates_surrounding_whitespace() {
        let (_dir, store) = open_store();
        let stat = id("root_test");
        fs::write(store.record_path(&stat, StateField::Detection), "  2024-12-08 \r\n").unwrap();
        assert_eq!(
            store.read(&stat).unwrap().detection_date,
            Some(date(2024, 12, 8))
        );
    }

    #[test]
    fn corrupt_record_is_an_error() {
        let (_dir, store) = open_store();
        let stat = id("root_test");
        fs::write(store.record_path(&stat, StateField::Marker), "8 Dec 2024").unwrap();

        match store.read(&stat) {
            Err(StorageError::Corrupt { content, .. }) => assert_eq!(content, "8 Dec 2024"),
            other => panic!("expected corrupt record, got {other:?}"),
        }
    }

    #[test]
    fn concurrent_writer_is_reported_as_contended() {
        let (_dir, store) = open_store();
        let stat = id("root_test");
        fs::write(store.temp_path(&stat, StateField::Marker), "").unwrap();

        let result = store.write(&stat, StateField::Marker, date(2024, 12, 5));
        assert!(matches!(result, Err(StorageError::Contended { .. })));
        assert_eq!(store.read(&stat).unwrap().last_known_marker, None);
    }

    #[test]
    fn stale_temp_files_are_cleared_under_lock() {
        let (_dir, store) = open_store();
        let stat = id("root_test");
        fs::write(store.temp_path(&stat, StateField::Marker), "2024-1").unwrap();
        fs::write(store.temp_path(&stat, StateField::Detection), "").unwrap();

        let lock = StateLock::acquire(store.dir()).unwrap();
        assert_eq!(store.clear_stale_temp_files(&lock).unwrap(), 2);

        store.write(&stat, StateField::Marker, date(2024, 12, 5)).unwrap();
        assert_eq!(store.read(&stat).unwrap().last_known_marker, Some(date(2024, 12, 5)));
    }
}
