//! Event reconciliation: decide whether a freshly observed marker means a
//! new century.
//!
//! The source reports a *marker* (the start date of the most recent
//! qualifying match), not the century itself. Markers wobble: rows get
//! reordered, pages get re-scraped, a match's listed start shifts by a day.
//! The reconciler compares the observed marker against the persisted one
//! and only records a new *detection date* when the marker jumps by more
//! than the noise threshold.
//!
//! # Decision Table
//!
//! | Prior marker | Observed vs prior | Writes | Detection date |
//! |--------------|-------------------|--------|----------------|
//! | absent | any | detection = fallback, marker = observed | fallback |
//! | `M` | `Δ > threshold` | detection = today, marker = observed | today |
//! | `M` | `0 < Δ <= threshold` | none | unchanged |
//! | `M` | equal | none | unchanged |
//!
//! Bootstrapping with the fallback date avoids claiming "detected today"
//! for an event that happened long before the first run.
//!
//! Writes are issued in [`StateField::WRITE_ORDER`] (detection, then
//! marker). A crash between them leaves the old marker in place, so the
//! next run sees the same jump and records it again.

use centurywatch_store::{StateStore, StorageError};
use centurywatch_types::{PersistedState, StateField, StatisticDef};
use chrono::NaiveDate;

/// Default largest marker shift, in days, still treated as the same event.
pub const DEFAULT_NOISE_THRESHOLD_DAYS: u32 = 5;

/// What the reconciler concluded for one statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// No marker had been recorded; state initialised from the fallback.
    Bootstrapped,
    /// The marker jumped past the noise threshold: a new event.
    NewEvent {
        /// The marker that was replaced.
        previous_marker: NaiveDate,
    },
    /// The marker moved within the noise threshold and was ignored.
    Noise {
        /// Absolute shift between observed and known marker, in days.
        drift_days: u64,
    },
    /// The observed marker equals the known one.
    Unchanged,
}

impl ReconcileOutcome {
    /// Short label for logs.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Bootstrapped => "bootstrapped",
            Self::NewEvent { .. } => "new_event",
            Self::Noise { .. } => "noise",
            Self::Unchanged => "unchanged",
        }
    }

    /// Whether this outcome changes persisted state.
    pub const fn persists(&self) -> bool {
        matches!(self, Self::Bootstrapped | Self::NewEvent { .. })
    }
}

/// Result of reconciling one statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciliation {
    /// State after reconciliation (as persisted, when anything was written).
    pub state: PersistedState,
    /// What was concluded.
    pub outcome: ReconcileOutcome,
}

impl Reconciliation {
    /// The detection date to report, if one is recorded.
    ///
    /// Absent only when a marker exists without a detection date, which
    /// this system never writes; callers fall back to the configured date.
    pub const fn detection_date(&self) -> Option<NaiveDate> {
        self.state.detection_date
    }
}

/// Compares observed markers with persisted state and updates the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciler {
    noise_threshold_days: u32,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(DEFAULT_NOISE_THRESHOLD_DAYS)
    }
}

impl Reconciler {
    /// Create a reconciler. Shifts strictly greater than
    /// `noise_threshold_days` count as new events.
    pub const fn new(noise_threshold_days: u32) -> Self {
        Self {
            noise_threshold_days,
        }
    }

    /// The configured noise threshold in days.
    pub const fn noise_threshold_days(&self) -> u32 {
        self.noise_threshold_days
    }

    /// Decide the new state without touching any store.
    pub fn decide(
        &self,
        prior: PersistedState,
        observed: NaiveDate,
        fallback: NaiveDate,
        today: NaiveDate,
    ) -> Reconciliation {
        let Some(known) = prior.last_known_marker else {
            return Reconciliation {
                state: PersistedState::recorded(observed, fallback),
                outcome: ReconcileOutcome::Bootstrapped,
            };
        };

        if observed == known {
            return Reconciliation {
                state: prior,
                outcome: ReconcileOutcome::Unchanged,
            };
        }

        let drift_days = observed.signed_duration_since(known).num_days().unsigned_abs();
        if drift_days > u64::from(self.noise_threshold_days) {
            Reconciliation {
                state: PersistedState::recorded(observed, today),
                outcome: ReconcileOutcome::NewEvent {
                    previous_marker: known,
                },
            }
        } else {
            Reconciliation {
                state: prior,
                outcome: ReconcileOutcome::Noise { drift_days },
            }
        }
    }

    /// Reconcile one statistic against the store.
    ///
    /// Reads prior state, decides, and persists the result when the outcome
    /// calls for it.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the read or either write fails. A failed
    /// write may leave the detection field updated without the marker;
    /// the next run repeats the same decision.
    pub fn reconcile<S: StateStore + ?Sized>(
        &self,
        store: &S,
        statistic: &StatisticDef,
        observed: NaiveDate,
        today: NaiveDate,
    ) -> Result<Reconciliation, StorageError> {
        let prior = store.read(&statistic.id)?;
        if !prior.is_consistent() {
            tracing::warn!(
                statistic = %statistic.id,
                detection = ?prior.detection_date,
                "Detection date without marker, re-bootstrapping"
            );
        }

        let result = self.decide(prior, observed, statistic.fallback_date, today);

        if result.outcome.persists() {
            for field in StateField::WRITE_ORDER {
                if let Some(date) = result.state.get(field) {
                    store.write(&statistic.id, field, date)?;
                }
            }
        }

        match result.outcome {
            ReconcileOutcome::Bootstrapped => tracing::info!(
                statistic = %statistic.id,
                observed = %observed,
                detection = %statistic.fallback_date,
                "Bootstrapped state from fallback date"
            ),
            ReconcileOutcome::NewEvent { previous_marker } => tracing::info!(
                statistic = %statistic.id,
                observed = %observed,
                known = %previous_marker,
                detection = %today,
                "New event detected"
            ),
            ReconcileOutcome::Noise { drift_days } => tracing::warn!(
                statistic = %statistic.id,
                observed = %observed,
                known = ?prior.last_known_marker,
                drift_days,
                threshold = self.noise_threshold_days,
                "Ignoring marker drift within noise threshold"
            ),
            ReconcileOutcome::Unchanged => tracing::debug!(
                statistic = %statistic.id,
                observed = %observed,
                "Marker unchanged"
            ),
        }

        Ok(result)
    }
}
