//! Wall-clock abstraction.
//!
//! Reconciliation stamps new events with "today" and the report prints a
//! generation time, so every run reads the time exactly once through a
//! [`Clock`]. Tests substitute a [`FixedClock`] to make runs deterministic.

use std::sync::Mutex;
use std::sync::PoisonError;

use chrono::{Local, NaiveDate, NaiveDateTime};

/// Source of the current local date and time.
pub trait Clock {
    /// The current local date and time.
    fn now(&self) -> NaiveDateTime;

    /// The current local calendar date.
    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// The system clock in the local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock frozen at a settable instant.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    /// Create a clock that reports `now` until changed.
    pub const fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Create a clock frozen at `hh:mm:ss` on `date`.
    ///
    /// Out-of-range time components fall back to midnight.
    pub fn at(date: NaiveDate, hour: u32, min: u32, sec: u32) -> Self {
        let now = date
            .and_hms_opt(hour, min, sec)
            .unwrap_or_else(|| date.and_time(chrono::NaiveTime::MIN));
        Self::new(now)
    }

    /// Move the clock to a new instant.
    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
