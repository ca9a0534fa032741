//! Calendar-month window arithmetic.

use chrono::{Datelike, Duration, NaiveDate};

/// A closed calendar-month interval `[start, end]`.
///
/// `start` is always the first day of the month and `end` the last day,
/// inclusive. Overlap computations against half-open project intervals use
/// [`TargetMonth::end_exclusive`], the first day of the following month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetMonth {
    start: NaiveDate,
    end: NaiveDate,
}

impl TargetMonth {
    /// The month containing the given reference date.
    pub fn containing(reference: NaiveDate) -> Self {
        let (next_year, next_month) = if reference.month() == 12 {
            (reference.year() + 1, 1)
        } else {
            (reference.year(), reference.month() + 1)
        };
        // Day 1 of a known-good year/month pair is always constructible.
        let start = NaiveDate::from_ymd_opt(reference.year(), reference.month(), 1)
            .expect("first of month is a valid date");
        let next_start = NaiveDate::from_ymd_opt(next_year, next_month, 1)
            .expect("first of month is a valid date");

        Self {
            start,
            end: next_start - Duration::days(1),
        }
    }

    /// First calendar day of the month.
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last calendar day of the month, inclusive.
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// First day of the following month, for half-open interval arithmetic.
    pub fn end_exclusive(&self) -> NaiveDate {
        self.end + Duration::days(1)
    }
}
