//! The date window a run synchronizes.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::RunError;

/// Inclusive, timezone-naive window of record creation timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl SyncWindow {
    /// Creates a window, rejecting `start > end`.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::InvalidRange`] when the window is empty.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, RunError> {
        if start > end {
            return Err(RunError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Inclusive lower bound.
    #[must_use]
    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    /// Inclusive upper bound.
    #[must_use]
    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    /// Year sent as `year_start` to the search endpoint.
    #[must_use]
    pub fn start_year(&self) -> i32 {
        self.start.year()
    }

    /// Year sent as `year_end` to the search endpoint.
    #[must_use]
    pub fn end_year(&self) -> i32 {
        self.end.year()
    }

    /// Returns true if `timestamp` falls inside the window, both ends inclusive.
    #[must_use]
    pub fn contains(&self, timestamp: NaiveDateTime) -> bool {
        self.start <= timestamp && timestamp <= self.end
    }

    /// Date persisted as the checkpoint once this window has been attempted.
    #[must_use]
    pub fn checkpoint_date(&self) -> NaiveDate {
        self.end.date()
    }
}

/// First instant of `date`.
#[must_use]
pub fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// Last representable instant of `date`.
#[must_use]
pub fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    start_of_day(date) + Duration::days(1) - Duration::nanoseconds(1)
}
