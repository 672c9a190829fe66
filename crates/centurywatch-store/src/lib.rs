//! Durable per-statistic state for the centurywatch milestone tracker.
//!
//! Each tracked statistic owns two independently persisted dates: the last
//! observed source marker and the detection date. There are no transactions
//! across records; every single-field write is atomic and durable before it
//! returns.
//!
//! # Architecture
//!
//! ```text
//! Reconciler
//!     |
//!     +-- read(statistic)               --> PersistedState (absent = never recorded)
//!     +-- write(statistic, field, date) --> one record, temp + fsync + rename
//!
//! Runner
//!     +-- StateLock::acquire(dir)       --> one run per state directory
//! ```
//!
//! # Modules
//!
//! - [`file_store`] -- One text file per (statistic, field)
//! - [`memory_store`] -- In-process store for dry runs and tests
//! - [`lock`] -- Directory lock guaranteeing a single writer
//! - [`error`] -- Shared error type

pub mod error;
pub mod file_store;
pub mod lock;
pub mod memory_store;

use centurywatch_types::{PersistedState, StateField, StatisticId};
use chrono::NaiveDate;

// Re-export primary types for convenience.
pub use error::StorageError;
pub use file_store::FileStateStore;
pub use lock::StateLock;
pub use memory_store::MemoryStateStore;

/// Key-value persistence of per-statistic state.
pub trait StateStore {
    /// Read both fields for `statistic`.
    ///
    /// Missing records yield absent fields; only I/O faults and corrupt
    /// records are errors.
    fn read(&self, statistic: &StatisticId) -> Result<PersistedState, StorageError>;

    /// Overwrite exactly one field, durably, creating the record if needed.
    fn write(
        &self,
        statistic: &StatisticId,
        field: StateField,
        date: NaiveDate,
    ) -> Result<(), StorageError>;
}

impl<S: StateStore + ?Sized> StateStore for &S {
    fn read(&self, statistic: &StatisticId) -> Result<PersistedState, StorageError> {
        (**self).read(statistic)
    }

    fn write(
        &self,
        statistic: &StatisticId,
        field: StateField,
        date: NaiveDate,
    ) -> Result<(), StorageError> {
        (**self).write(statistic, field, date)
    }
}
