//! Multi-run scenarios against a real state directory.
//!
//! Each run builds a fresh [`FileStateStore`] over the same directory, the
//! way successive scheduled invocations would.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use centurywatch_core::clock::FixedClock;
use centurywatch_core::publish::RecordingPublisher;
use centurywatch_core::reconciler::{ReconcileOutcome, Reconciler};
use centurywatch_core::registry::{MilestoneRegistry, StatisticOutcome};
use centurywatch_core::run::{RunSummary, run_once};
use centurywatch_core::source::{FetchFailure, StubMarkerSource};
use centurywatch_store::{FileStateStore, StateStore};
use centurywatch_types::{StatisticDef, StatisticId};
use chrono::NaiveDate;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn statistic_a() -> StatisticDef {
    StatisticDef {
        id: StatisticId::new("a").unwrap(),
        person: "Joe Root".to_owned(),
        description: "Test century".to_owned(),
        source_url: "src/a".to_owned(),
        fallback_date: date(2022, 1, 1),
    }
}

fn registry() -> MilestoneRegistry {
    MilestoneRegistry::new(
        vec![statistic_a()],
        Reconciler::default(),
        Duration::from_secs(15),
    )
}

async fn invoke(
    dir: &Path,
    source: &StubMarkerSource,
    publisher: &RecordingPublisher,
    today: NaiveDate,
) -> RunSummary {
    let store = FileStateStore::open(dir).unwrap();
    run_once(
        &registry(),
        source,
        &store,
        publisher,
        &FixedClock::at(today, 8, 0, 0),
        &AtomicBool::new(false),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn bootstrap_stable_then_new_event() {
    let dir = tempfile::tempdir().unwrap();
    let id = statistic_a().id;
    let source = StubMarkerSource::new().with_marker("src/a", date(2022, 3, 15));
    let publisher = RecordingPublisher::new();

    // First run ever: fallback stands, marker is recorded.
    let first = invoke(dir.path(), &source, &publisher, date(2024, 1, 1)).await;
    assert_eq!(first.run.snapshot.get(&id), Some(date(2022, 1, 1)));
    assert!(matches!(
        first.run.results[0].outcome,
        StatisticOutcome::Reconciled(ReconcileOutcome::Bootstrapped)
    ));

    // Unchanged source: nothing moves.
    let second = invoke(dir.path(), &source, &publisher, date(2024, 1, 2)).await;
    assert_eq!(second.run.snapshot.get(&id), Some(date(2022, 1, 1)));
    assert!(matches!(
        second.run.results[0].outcome,
        StatisticOutcome::Reconciled(ReconcileOutcome::Unchanged)
    ));

    // A marker 30 days later is a new event dated on the day it was seen.
    source.set_marker("src/a", date(2022, 4, 14));
    let third = invoke(dir.path(), &source, &publisher, date(2024, 2, 1)).await;
    assert_eq!(third.run.snapshot.get(&id), Some(date(2024, 2, 1)));
    assert_eq!(third.report.lines[0].elapsed_days, 0);

    let persisted = FileStateStore::open(dir.path()).unwrap().read(&id).unwrap();
    assert_eq!(persisted.last_known_marker, Some(date(2022, 4, 14)));
    assert_eq!(persisted.detection_date, Some(date(2024, 2, 1)));

    let posts = publisher.posts();
    assert_eq!(posts.len(), 3);
    assert_eq!(
        posts[0],
        "730 days since Joe Root's last Test century.\nThis was posted at 08:00:00"
    );
}

#[tokio::test]
async fn small_revision_is_absorbed_as_noise() {
    let dir = tempfile::tempdir().unwrap();
    let id = statistic_a().id;
    let source = StubMarkerSource::new().with_marker("src/a", date(2022, 3, 15));
    let publisher = RecordingPublisher::new();

    invoke(dir.path(), &source, &publisher, date(2024, 1, 1)).await;

    source.set_marker("src/a", date(2022, 3, 12));
    let run = invoke(dir.path(), &source, &publisher, date(2024, 1, 5)).await;
    assert!(matches!(
        run.run.results[0].outcome,
        StatisticOutcome::Reconciled(ReconcileOutcome::Noise { drift_days: 3 })
    ));
    assert_eq!(run.run.snapshot.get(&id), Some(date(2022, 1, 1)));
}

#[tokio::test]
async fn fetch_failure_keeps_last_detection() {
    let dir = tempfile::tempdir().unwrap();
    let id = statistic_a().id;
    let source = StubMarkerSource::new().with_marker("src/a", date(2022, 3, 15));
    let publisher = RecordingPublisher::new();

    invoke(dir.path(), &source, &publisher, date(2024, 1, 1)).await;
    source.set_marker("src/a", date(2023, 6, 1));
    invoke(dir.path(), &source, &publisher, date(2024, 3, 1)).await;

    source.set_failure("src/a", FetchFailure::Status { status: 503 });
    let run = invoke(dir.path(), &source, &publisher, date(2024, 3, 11)).await;

    assert!(matches!(
        run.run.results[0].outcome,
        StatisticOutcome::FetchFailed(FetchFailure::Status { status: 503 })
    ));
    assert_eq!(run.run.snapshot.get(&id), Some(date(2024, 3, 1)));
    assert_eq!(run.report.lines[0].elapsed_days, 10);
    assert!(run.published());
}

#[tokio::test]
async fn new_event_interrupted_between_writes_is_detected_again() {
    let dir = tempfile::tempdir().unwrap();
    let id = statistic_a().id;
    let source = StubMarkerSource::new().with_marker("src/a", date(2022, 3, 15));
    let publisher = RecordingPublisher::new();
    invoke(dir.path(), &source, &publisher, date(2024, 1, 1)).await;

    // A leftover marker temp file makes only the second write fail.
    let blocker = dir.path().join(".a.marker.tmp");
    std::fs::write(&blocker, "").unwrap();
    source.set_marker("src/a", date(2022, 5, 1));
    let interrupted = invoke(dir.path(), &source, &publisher, date(2024, 2, 1)).await;

    assert!(matches!(
        interrupted.run.results[0].outcome,
        StatisticOutcome::StorageFailed(_)
    ));
    assert_eq!(interrupted.run.snapshot.get(&id), Some(date(2024, 2, 1)));
    let persisted = FileStateStore::open(dir.path()).unwrap().read(&id).unwrap();
    assert_eq!(persisted.last_known_marker, Some(date(2022, 3, 15)));
    assert_eq!(persisted.detection_date, Some(date(2024, 2, 1)));

    std::fs::remove_file(&blocker).unwrap();
    let retried = invoke(dir.path(), &source, &publisher, date(2024, 2, 1)).await;

    assert!(matches!(
        retried.run.results[0].outcome,
        StatisticOutcome::Reconciled(ReconcileOutcome::NewEvent { .. })
    ));
    let persisted = FileStateStore::open(dir.path()).unwrap().read(&id).unwrap();
    assert_eq!(persisted.last_known_marker, Some(date(2022, 5, 1)));
    assert_eq!(persisted.detection_date, Some(date(2024, 2, 1)));
    assert_eq!(retried.report.lines[0].elapsed_days, 0);
}
