//! Scheduled runner for the centurywatch milestone tracker.
//!
//! One invocation is one run: reconcile every tracked statistic against
//! its source page, persist what changed, and publish a single post listing
//! the days since each milestone. A scheduler (cron, a systemd timer)
//! invokes it once a day.
//!
//! # Architecture
//!
//! ```text
//! centurywatch.yaml --> WatchConfig
//!                          |
//! StateLock(state dir) --> MilestoneRegistry --HTTP--> Statsguru pages
//!                          |        |
//!                          |        +--> FileStateStore (per-statistic records)
//!                          v
//!                       compose --> ReportPublisher (X API | stdout)
//! ```
//!
//! Fetch and storage faults for one statistic never stop the run; only a
//! configuration, lock or credential problem does. A failed publish exits
//! non-zero after all state has been committed.

mod config;
mod error;
mod http;
mod publisher;
mod scrape;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use centurywatch_core::clock::SystemClock;
use centurywatch_core::config::{LogFormat, LoggingConfig, WatchConfig};
use centurywatch_core::registry::MilestoneRegistry;
use centurywatch_core::run::{RunSummary, log_run_summary, run_once};
use centurywatch_store::{FileStateStore, StateLock};
use tracing::{Instrument, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::config::RunnerEnv;
use crate::error::AppError;
use crate::publisher::create_publisher;
use crate::scrape::HttpMarkerSource;

/// Application entry point.
///
/// Loads configuration, initializes logging, then executes exactly one
/// run.
///
/// # Errors
///
/// Returns an error if the run cannot start, the report cannot be
/// composed, or the report could not be published.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let env = RunnerEnv::from_env();
    let config = WatchConfig::from_file(&env.config_path)
        .map_err(AppError::from)
        .with_context(|| format!("loading {}", env.config_path.display()))?;

    init_tracing(&config.logging);

    info!(
        config_path = %env.config_path.display(),
        statistics = config.statistics.len(),
        state_dir = %config.state.dir.display(),
        publisher = ?config.publisher.kind,
        noise_threshold_days = config.reconcile.noise_threshold_days,
        "centurywatch starting"
    );

    let summary = execute(&env, &config).await?;
    log_run_summary(&summary);

    if let Err(failure) = summary.publish {
        anyhow::bail!("report was not published: {failure}");
    }
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` takes precedence over the
/// configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_env_err| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

/// Lock the state directory and perform one run.
async fn execute(env: &RunnerEnv, config: &WatchConfig) -> Result<RunSummary, AppError> {
    let store = FileStateStore::open(&config.state.dir)?;
    let lock = StateLock::acquire(store.dir())?;
    let cleared = store.clear_stale_temp_files(&lock)?;
    if cleared > 0 {
        warn!(cleared, "Cleared temp files from an interrupted run");
    }

    let fetch_timeout = config.source.fetch_timeout();
    let source = HttpMarkerSource::new(
        http::build_client(config.source.user_agent.as_deref(), fetch_timeout)?,
        config.source.date_column.clone(),
    );
    let publisher = create_publisher(&config.publisher, env, http::api_client(fetch_timeout)?)?;

    if config.publisher.verify_credentials {
        match publisher.verify_credentials().await {
            Ok(Some(username)) => info!(username = %username, "authenticated as"),
            Ok(None) => {}
            Err(failure) => return Err(AppError::Credentials(failure)),
        }
    }

    let stop = Arc::new(AtomicBool::new(false));
    let stop_on_signal = Arc::clone(&stop);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing the statistic in flight");
            stop_on_signal.store(true, Ordering::SeqCst);
        }
    });

    let registry = MilestoneRegistry::from_config(config);
    let run_id = Uuid::now_v7();
    let summary = run_once(&registry, &source, &store, &publisher, &SystemClock, &stop)
        .instrument(tracing::info_span!("run", run_id = %run_id))
        .await?;

    drop(lock);
    Ok(summary)
}
