//! Milestone detection, reconciliation and reporting for centurywatch.
//!
//! A run reads the latest event marker for every tracked statistic,
//! reconciles it against persisted state, and publishes a single post
//! listing the days elapsed since each milestone.
//!
//! # Modules
//!
//! - [`clock`] -- Wall-clock abstraction with a fixed clock for tests.
//! - [`config`] -- Configuration loading from `centurywatch.yaml` into
//!   strongly-typed structs.
//! - [`publish`] -- [`Publisher`] trait and [`RecordingPublisher`].
//! - [`reconciler`] -- Noise-tolerant marker reconciliation.
//! - [`registry`] -- Per-statistic refresh building the milestone snapshot.
//! - [`report`] -- Report composition from the snapshot.
//! - [`run`] -- One end-to-end pass: reconcile, compose, publish.
//! - [`source`] -- [`MarkerSource`] trait and [`StubMarkerSource`].
//!
//! [`Publisher`]: publish::Publisher
//! [`RecordingPublisher`]: publish::RecordingPublisher
//! [`MarkerSource`]: source::MarkerSource
//! [`StubMarkerSource`]: source::StubMarkerSource

pub mod clock;
pub mod config;
pub mod publish;
pub mod reconciler;
pub mod registry;
pub mod report;
pub mod run;
pub mod source;
