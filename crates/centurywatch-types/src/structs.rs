//! Core entity structs: statistic definitions, persisted state and the
//! per-run milestone snapshot.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::enums::StateField;
use crate::ids::StatisticId;

// ---------------------------------------------------------------------------
// Statistic definition
// ---------------------------------------------------------------------------

/// One tracked milestone series, as declared in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticDef {
    /// Stable identifier; also names the persisted records.
    pub id: StatisticId,
    /// Display name of the cricketer. Report lines are grouped by this.
    pub person: String,
    /// What the milestone is, e.g. `Test century in a winning cause`.
    pub description: String,
    /// Locator handed to the source reader. Opaque to the core.
    pub source_url: String,
    /// Date used when nothing has been persisted for this statistic yet.
    pub fallback_date: NaiveDate,
}

// ---------------------------------------------------------------------------
// Persisted state
// ---------------------------------------------------------------------------

/// Durable per-statistic state.
///
/// Both fields are stored as separate records and may be absent
/// independently. A detection date is only meaningful alongside a marker;
/// see [`PersistedState::is_consistent`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Most recent event marker observed on a prior run.
    pub last_known_marker: Option<NaiveDate>,
    /// Date on which the current event was first confirmed as new.
    pub detection_date: Option<NaiveDate>,
}

impl PersistedState {
    /// State with both fields present.
    pub const fn recorded(marker: NaiveDate, detection: NaiveDate) -> Self {
        Self {
            last_known_marker: Some(marker),
            detection_date: Some(detection),
        }
    }

    /// Whether nothing has ever been recorded.
    pub const fn is_empty(&self) -> bool {
        self.last_known_marker.is_none() && self.detection_date.is_none()
    }

    /// A detection date never exists without a backing marker.
    pub const fn is_consistent(&self) -> bool {
        !(self.detection_date.is_some() && self.last_known_marker.is_none())
    }

    /// Value of a single field.
    pub const fn get(&self, field: StateField) -> Option<NaiveDate> {
        match field {
            StateField::Marker => self.last_known_marker,
            StateField::Detection => self.detection_date,
        }
    }

    /// Overwrite a single field.
    pub const fn set(&mut self, field: StateField, date: NaiveDate) {
        match field {
            StateField::Marker => self.last_known_marker = Some(date),
            StateField::Detection => self.detection_date = Some(date),
        }
    }

    /// The detection date, or `fallback` when none has been recorded.
    pub fn detection_or(&self, fallback: NaiveDate) -> NaiveDate {
        self.detection_date.unwrap_or(fallback)
    }
}

// ---------------------------------------------------------------------------
// Milestone snapshot
// ---------------------------------------------------------------------------

/// Effective "days since" anchor for every statistic in the current run.
///
/// Built fresh each run from persisted state and fallbacks; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MilestoneSnapshot {
    dates: BTreeMap<StatisticId, NaiveDate>,
}

impl MilestoneSnapshot {
    /// Create an empty snapshot.
    pub const fn new() -> Self {
        Self {
            dates: BTreeMap::new(),
        }
    }

    /// Record the effective date for a statistic, replacing any prior value.
    pub fn insert(&mut self, id: StatisticId, date: NaiveDate) {
        self.dates.insert(id, date);
    }

    /// Effective date for a statistic.
    pub fn get(&self, id: &StatisticId) -> Option<NaiveDate> {
        self.dates.get(id).copied()
    }

    /// Number of statistics in the snapshot.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Whether the snapshot holds no statistics.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Iterate over `(statistic, date)` pairs in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&StatisticId, NaiveDate)> {
        self.dates.iter().map(|(id, date)| (id, *date))
    }
}

impl FromIterator<(StatisticId, NaiveDate)> for MilestoneSnapshot {
    fn from_iter<T: IntoIterator<Item = (StatisticId, NaiveDate)>>(iter: T) -> Self {
        Self {
            dates: iter.into_iter().collect(),
        }
    }
}
