//! In-process state store.
//!
//! Used for dry runs (state is discarded at exit) and by tests, which can
//! inject read/write faults per statistic and count writes to prove that a
//! code path left the store untouched.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, PoisonError};

use centurywatch_types::{PersistedState, StateField, StatisticId};
use chrono::NaiveDate;

use crate::StateStore;
use crate::error::StorageError;

#[derive(Debug, Default)]
struct Inner {
    states: BTreeMap<StatisticId, PersistedState>,
    failing_reads: BTreeSet<StatisticId>,
    failing_writes: BTreeSet<StatisticId>,
    writes: u64,
}

/// Thread-safe in-memory [`StateStore`].
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    inner: Mutex<Inner>,
}

impl MemoryStateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a statistic's state without counting it as a write.
    pub fn seed(&self, statistic: StatisticId, state: PersistedState) {
        self.lock().states.insert(statistic, state);
    }

    /// Make every read of `statistic` fail.
    pub fn fail_reads_for(&self, statistic: StatisticId) {
        self.lock().failing_reads.insert(statistic);
    }

    /// Make every write to `statistic` fail.
    pub fn fail_writes_for(&self, statistic: StatisticId) {
        self.lock().failing_writes.insert(statistic);
    }

    /// Total number of successful field writes.
    pub fn write_count(&self) -> u64 {
        self.lock().writes
    }

    /// Current state of a statistic, bypassing fault injection.
    pub fn snapshot(&self, statistic: &StatisticId) -> PersistedState {
        self.lock().states.get(statistic).copied().unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StateStore for MemoryStateStore {
    fn read(&self, statistic: &StatisticId) -> Result<PersistedState, StorageError> {
        let inner = self.lock();
        if inner.failing_reads.contains(statistic) {
            return Err(StorageError::Unavailable(format!("read of {statistic} refused")));
        }
        Ok(inner.states.get(statistic).copied().unwrap_or_default())
    }

    fn write(
        &self,
        statistic: &StatisticId,
        field: StateField,
        date: NaiveDate,
    ) -> Result<(), StorageError> {
        let mut inner = self.lock();
        if inner.failing_writes.contains(statistic) {
            return Err(StorageError::Unavailable(format!(
                "write of {statistic}.{field} refused"
            )));
        }
        inner
            .states
            .entry(statistic.clone())
            .or_default()
            .set(field, date);
        inner.writes = inner.writes.saturating_add(1);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn id(s: &str) -> StatisticId {
        StatisticId::new(s).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn seed_is_not_counted_as_write() {
        let store = MemoryStateStore::new();
        store.seed(id("root_test"), PersistedState::recorded(date(2024, 12, 5), date(2024, 12, 8)));
        assert_eq!(store.write_count(), 0);
        assert_eq!(store.read(&id("root_test")).unwrap().detection_date, Some(date(2024, 12, 8)));
    }

    #[test]
    fn writes_update_single_field() {
        let store = MemoryStateStore::new();
        store.write(&id("root_test"), StateField::Detection, date(2024, 12, 8)).unwrap();
        let state = store.snapshot(&id("root_test"));
        assert_eq!(state.detection_date, Some(date(2024, 12, 8)));
        assert_eq!(state.last_known_marker, None);
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn injected_faults_are_scoped_to_one_statistic() {
        let store = MemoryStateStore::new();
        store.fail_writes_for(id("root_test"));
        store.fail_reads_for(id("root_odi"));

        assert!(store.write(&id("root_test"), StateField::Marker, date(2024, 1, 1)).is_err());
        assert!(store.read(&id("root_odi")).is_err());
        assert!(store.write(&id("stokes_test"), StateField::Marker, date(2024, 1, 1)).is_ok());
        assert_eq!(store.write_count(), 1);
    }
}
