//! Shared type definitions for the centurywatch milestone tracker.
//!
//! This crate is the single source of truth for the types that flow between
//! the state store, the reconciliation core and the runner binary.
//!
//! # Modules
//!
//! - [`ids`] -- Validated [`StatisticId`] identifier
//! - [`enums`] -- [`StateField`] naming the two persisted fields
//! - [`structs`] -- Statistic definitions, persisted state, milestone snapshot

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::StateField;
pub use ids::{InvalidStatisticId, StatisticId};
pub use structs::{MilestoneSnapshot, PersistedState, StatisticDef};
