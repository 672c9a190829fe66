//! Enumeration types shared across the workspace.

use serde::{Deserialize, Serialize};

/// One of the two independently persisted fields of a statistic's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateField {
    /// The last event marker (match start date) observed at the source.
    Marker,
    /// The date this process first confirmed the current event as new.
    Detection,
}

impl StateField {
    /// Both fields, in the order a full update writes them.
    ///
    /// Detection goes first so that a crash before the marker write leaves
    /// the old marker in place and the jump is re-detected on the next run.
    pub const WRITE_ORDER: [Self; 2] = [Self::Detection, Self::Marker];

    /// File-name suffix of the persisted record for this field.
    pub const fn record_suffix(self) -> &'static str {
        match self {
            Self::Marker => "marker",
            Self::Detection => "detected",
        }
    }
}

impl core::fmt::Display for StateField {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.record_suffix())
    }
}
