//! Milestone registry: reconcile every configured statistic and assemble
//! the run's [`MilestoneSnapshot`].
//!
//! Statistics are processed sequentially and in isolation. Each one is its
//! own small transaction against its own records: a fetch failure, timeout
//! or storage fault for one statistic only affects that statistic, which
//! falls back to its last persisted detection date (or configured fallback)
//! for this run.
//!
//! ```text
//! for each statistic:
//!     fetch marker (bounded) --fail--> persisted detection | fallback
//!         |
//!         ok
//!         v
//!     Reconciler::reconcile --storage error--> persisted detection | fallback
//!         |
//!         v
//!     snapshot[statistic] = detection | fallback
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use centurywatch_store::{StateStore, StorageError};
use centurywatch_types::{MilestoneSnapshot, StatisticDef, StatisticId};
use chrono::NaiveDate;

use crate::config::WatchConfig;
use crate::reconciler::{ReconcileOutcome, Reconciler};
use crate::source::{FetchFailure, MarkerSource};

/// How a statistic's effective date was arrived at in this run.
#[derive(Debug)]
pub enum StatisticOutcome {
    /// The marker was fetched and reconciled.
    Reconciled(ReconcileOutcome),
    /// The marker could not be fetched; prior state was reused untouched.
    FetchFailed(FetchFailure),
    /// Reconciliation hit a storage fault; whatever is persisted stands.
    StorageFailed(StorageError),
    /// The run was asked to stop before this statistic was reached.
    Skipped,
}

impl StatisticOutcome {
    /// Short label for logs.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Reconciled(outcome) => outcome.label(),
            Self::FetchFailed(_) => "fetch_failed",
            Self::StorageFailed(_) => "storage_failed",
            Self::Skipped => "skipped",
        }
    }

    /// Whether the statistic was brought up to date with the source.
    pub const fn is_reconciled(&self) -> bool {
        matches!(self, Self::Reconciled(_))
    }
}

/// Per-statistic result of a registry refresh.
#[derive(Debug)]
pub struct StatisticResult {
    /// The statistic.
    pub id: StatisticId,
    /// Date from which days are counted in this run.
    pub effective_date: NaiveDate,
    /// How the effective date was obtained.
    pub outcome: StatisticOutcome,
}

/// Output of [`MilestoneRegistry::refresh`].
#[derive(Debug)]
pub struct RegistryRun {
    /// Effective date per statistic.
    pub snapshot: MilestoneSnapshot,
    /// One entry per configured statistic, in configuration order.
    pub results: Vec<StatisticResult>,
}

impl RegistryRun {
    /// Number of statistics that were reconciled against a fresh marker.
    pub fn reconciled_count(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_reconciled()).count()
    }

    /// Number of statistics whose outcome was a new event.
    pub fn new_event_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| {
                matches!(
                    r.outcome,
                    StatisticOutcome::Reconciled(ReconcileOutcome::NewEvent { .. })
                )
            })
            .count()
    }
}

/// Runs the reconciler over the fixed set of configured statistics.
#[derive(Debug, Clone)]
pub struct MilestoneRegistry {
    statistics: Vec<StatisticDef>,
    reconciler: Reconciler,
    fetch_timeout: Duration,
}

impl MilestoneRegistry {
    /// Create a registry from explicit parts.
    pub const fn new(
        statistics: Vec<StatisticDef>,
        reconciler: Reconciler,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            statistics,
            reconciler,
            fetch_timeout,
        }
    }

    /// Create a registry from validated configuration.
    pub fn from_config(config: &WatchConfig) -> Self {
        Self::new(
            config.statistics.clone(),
            Reconciler::new(config.reconcile.noise_threshold_days),
            config.source.fetch_timeout(),
        )
    }

    /// The configured statistics, in presentation order.
    pub fn statistics(&self) -> &[StatisticDef] {
        &self.statistics
    }

    /// Reconcile every statistic and build the snapshot.
    pub async fn refresh<M, S>(&self, source: &M, store: &S, today: NaiveDate) -> RegistryRun
    where
        M: MarkerSource + ?Sized,
        S: StateStore + ?Sized,
    {
        self.refresh_until(source, store, today, &AtomicBool::new(false))
            .await
    }

    /// Like [`MilestoneRegistry::refresh`], but stops reconciling once `stop`
    /// is set. The statistic in flight completes; the rest are reported as
    /// [`StatisticOutcome::Skipped`] with their last known dates.
    pub async fn refresh_until<M, S>(
        &self,
        source: &M,
        store: &S,
        today: NaiveDate,
        stop: &AtomicBool,
    ) -> RegistryRun
    where
        M: MarkerSource + ?Sized,
        S: StateStore + ?Sized,
    {
        let mut snapshot = MilestoneSnapshot::new();
        let mut results = Vec::with_capacity(self.statistics.len());

        for statistic in &self.statistics {
            let result = if stop.load(Ordering::SeqCst) {
                StatisticResult {
                    id: statistic.id.clone(),
                    effective_date: last_known_detection(store, statistic),
                    outcome: StatisticOutcome::Skipped,
                }
            } else {
                self.refresh_one(source, store, statistic, today).await
            };

            tracing::debug!(
                statistic = %result.id,
                effective_date = %result.effective_date,
                outcome = result.outcome.label(),
                "Statistic refreshed"
            );
            snapshot.insert(result.id.clone(), result.effective_date);
            results.push(result);
        }

        RegistryRun { snapshot, results }
    }

    async fn refresh_one<M, S>(
        &self,
        source: &M,
        store: &S,
        statistic: &StatisticDef,
        today: NaiveDate,
    ) -> StatisticResult
    where
        M: MarkerSource + ?Sized,
        S: StateStore + ?Sized,
    {
        let observed = match self.fetch(source, statistic).await {
            Ok(marker) => marker,
            Err(failure) => {
                tracing::warn!(
                    statistic = %statistic.id,
                    error = %failure,
                    "Marker fetch failed, keeping previous state"
                );
                return StatisticResult {
                    id: statistic.id.clone(),
                    effective_date: last_known_detection(store, statistic),
                    outcome: StatisticOutcome::FetchFailed(failure),
                };
            }
        };

        match self.reconciler.reconcile(store, statistic, observed, today) {
            Ok(reconciliation) => StatisticResult {
                id: statistic.id.clone(),
                effective_date: reconciliation
                    .detection_date()
                    .unwrap_or(statistic.fallback_date),
                outcome: StatisticOutcome::Reconciled(reconciliation.outcome),
            },
            Err(error) => {
                tracing::error!(
                    statistic = %statistic.id,
                    error = %error,
                    "Reconciliation aborted by storage error"
                );
                StatisticResult {
                    id: statistic.id.clone(),
                    effective_date: last_known_detection(store, statistic),
                    outcome: StatisticOutcome::StorageFailed(error),
                }
            }
        }
    }

    async fn fetch<M: MarkerSource + ?Sized>(
        &self,
        source: &M,
        statistic: &StatisticDef,
    ) -> Result<NaiveDate, FetchFailure> {
        tokio::time::timeout(
            self.fetch_timeout,
            source.fetch_latest_marker(&statistic.source_url),
        )
        .await
        .unwrap_or_else(|_elapsed| {
            Err(FetchFailure::Timeout {
                after_ms: u64::try_from(self.fetch_timeout.as_millis()).unwrap_or(u64::MAX),
            })
        })
    }
}

/// Persisted detection date, or the fallback if none is readable.
fn last_known_detection<S: StateStore + ?Sized>(store: &S, statistic: &StatisticDef) -> NaiveDate {
    match store.read(&statistic.id) {
        Ok(state) => state.detection_or(statistic.fallback_date),
        Err(error) => {
            tracing::warn!(
                statistic = %statistic.id,
                error = %error,
                "Could not read persisted state, using fallback date"
            );
            statistic.fallback_date
        }
    }
}
