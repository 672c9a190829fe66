//! One end-to-end pass: reconcile, compose, publish.
//!
//! [`run_once`] is what a scheduled invocation executes. The clock is read
//! exactly once so that every statistic, the day counts and the footer
//! agree on "today". All state writes happen inside the registry refresh,
//! before anything is published; a publish failure is carried back in the
//! [`RunSummary`] rather than aborting the run.

use std::sync::atomic::AtomicBool;

use centurywatch_store::StateStore;

use crate::clock::Clock;
use crate::publish::{PublishFailure, PublishReceipt, Publisher};
use crate::registry::{MilestoneRegistry, RegistryRun};
use crate::report::{self, Report, ReportError};
use crate::source::MarkerSource;

/// Errors that abort a run before anything is published.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The report could not be composed.
    #[error("report error: {source}")]
    Report {
        /// The underlying composition error.
        #[from]
        source: ReportError,
    },
}

/// Everything a single run produced.
#[derive(Debug)]
pub struct RunSummary {
    /// Per-statistic reconciliation results and the snapshot.
    pub run: RegistryRun,
    /// The composed report.
    pub report: Report,
    /// Outcome of publishing the report.
    pub publish: Result<PublishReceipt, PublishFailure>,
}

impl RunSummary {
    /// Whether the report reached its destination.
    pub const fn published(&self) -> bool {
        self.publish.is_ok()
    }
}

/// Execute one run.
///
/// Setting `stop` lets the statistic in flight finish and reports the
/// remaining ones with their last known dates. The report is still
/// composed and published so the post is never partial.
///
/// # Errors
///
/// Returns [`RunError::Report`] if the snapshot does not cover every
/// configured statistic.
pub async fn run_once<M, S, P, C>(
    registry: &MilestoneRegistry,
    source: &M,
    store: &S,
    publisher: &P,
    clock: &C,
    stop: &AtomicBool,
) -> Result<RunSummary, RunError>
where
    M: MarkerSource + ?Sized,
    S: StateStore + ?Sized,
    P: Publisher + ?Sized,
    C: Clock + ?Sized,
{
    let now = clock.now();
    let today = now.date();

    tracing::info!(
        today = %today,
        statistics = registry.statistics().len(),
        publisher = publisher.name(),
        "Run starting"
    );

    let run = registry.refresh_until(source, store, today, stop).await;
    let report = report::compose(registry.statistics(), &run.snapshot, now)?;
    let publish = publisher.publish(&report.text()).await;

    Ok(RunSummary {
        run,
        report,
        publish,
    })
}

/// Log one line per statistic plus a run total.
pub fn log_run_summary(summary: &RunSummary) {
    for line in &summary.report.lines {
        tracing::info!(
            statistic = %line.statistic,
            elapsed_days = line.elapsed_days,
            "Milestone"
        );
    }

    match &summary.publish {
        Ok(receipt) => tracing::info!(
            reconciled = summary.run.reconciled_count(),
            new_events = summary.run.new_event_count(),
            total = summary.run.results.len(),
            post_id = receipt.post_id.as_deref().unwrap_or("-"),
            "Run complete"
        ),
        Err(failure) => tracing::error!(
            reconciled = summary.run.reconciled_count(),
            new_events = summary.run.new_event_count(),
            total = summary.run.results.len(),
            error = %failure,
            "Run complete, publish failed"
        ),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use centurywatch_store::MemoryStateStore;
    use centurywatch_types::{StatisticDef, StatisticId};
    use chrono::NaiveDate;

    use super::*;
    use crate::clock::FixedClock;
    use crate::publish::RecordingPublisher;
    use crate::reconciler::Reconciler;
    use crate::source::StubMarkerSource;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn registry() -> MilestoneRegistry {
        MilestoneRegistry::new(
            vec![StatisticDef {
                id: StatisticId::new("root_test").unwrap(),
                person: "Joe Root".to_owned(),
                description: "Test century".to_owned(),
                source_url: "src/root_test".to_owned(),
                fallback_date: date(2024, 12, 8),
            }],
            Reconciler::default(),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn publishes_exactly_one_report() {
        let source = StubMarkerSource::new().with_marker("src/root_test", date(2024, 12, 5));
        let store = MemoryStateStore::new();
        let publisher = RecordingPublisher::new();
        let clock = FixedClock::at(date(2025, 7, 30), 9, 0, 4);

        let summary = run_once(
            &registry(),
            &source,
            &store,
            &publisher,
            &clock,
            &AtomicBool::new(false),
        )
        .await
        .unwrap();

        assert!(summary.published());
        assert_eq!(
            publisher.posts(),
            vec![
                "234 days since Joe Root's last Test century.\nThis was posted at 09:00:04"
                    .to_owned()
            ]
        );
        log_run_summary(&summary);
    }

    #[tokio::test]
    async fn publish_failure_keeps_committed_state() {
        let source = StubMarkerSource::new().with_marker("src/root_test", date(2024, 12, 5));
        let store = MemoryStateStore::new();
        let publisher = RecordingPublisher::failing(PublishFailure::Rejected {
            status: 403,
            body: "forbidden".to_owned(),
        });
        let clock = FixedClock::at(date(2025, 7, 30), 9, 0, 4);

        let summary = run_once(
            &registry(),
            &source,
            &store,
            &publisher,
            &clock,
            &AtomicBool::new(false),
        )
        .await
        .unwrap();

        assert!(!summary.published());
        let id = StatisticId::new("root_test").unwrap();
        assert_eq!(store.snapshot(&id).detection_date, Some(date(2024, 12, 8)));
        assert_eq!(store.snapshot(&id).last_known_marker, Some(date(2024, 12, 5)));
    }
}
