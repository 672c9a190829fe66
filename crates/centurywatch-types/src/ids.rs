//! Type-safe identifier for tracked statistics.
//!
//! A [`StatisticId`] names one milestone series (e.g. `root_test`). The id
//! doubles as the stem of the statistic's persisted record files, so it is
//! restricted to lowercase ASCII letters, digits, `_` and `-`.

use serde::{Deserialize, Serialize};

/// Maximum length of a statistic identifier.
const MAX_ID_LEN: usize = 64;

/// Errors produced when validating a statistic identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidStatisticId {
    /// The identifier was empty.
    #[error("statistic id must not be empty")]
    Empty,

    /// The identifier exceeded [`MAX_ID_LEN`] characters.
    #[error("statistic id `{id}` is longer than {MAX_ID_LEN} characters")]
    TooLong {
        /// The rejected identifier.
        id: String,
    },

    /// The identifier contained a character outside `[a-z0-9_-]`.
    #[error("statistic id `{id}` contains invalid character {ch:?}")]
    InvalidChar {
        /// The rejected identifier.
        id: String,
        /// The first offending character.
        ch: char,
    },
}

/// Identifier of one tracked milestone series.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StatisticId(String);

impl StatisticId {
    /// Validate and wrap an identifier.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidStatisticId`] if the identifier is empty, too long,
    /// or contains characters that are unsafe in a file name.
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidStatisticId> {
        let id = id.into();
        if id.is_empty() {
            return Err(InvalidStatisticId::Empty);
        }
        if id.len() > MAX_ID_LEN {
            return Err(InvalidStatisticId::TooLong { id });
        }
        if let Some(ch) = id
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_' || *c == '-'))
        {
            return Err(InvalidStatisticId::InvalidChar { id, ch });
        }
        Ok(Self(id))
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for StatisticId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for StatisticId {
    type Error = InvalidStatisticId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for StatisticId {
    type Error = InvalidStatisticId;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<StatisticId> for String {
    fn from(id: StatisticId) -> Self {
        id.0
    }
}
