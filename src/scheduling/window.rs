// src/scheduling/window.rs

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::Serialize;

/// An inclusive range of calendar days, the query window every date-scoped
/// read works over. Day boundaries are closed: 00:00:00.000 on the first day
/// through 23:59:59.999 on the last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// A single calendar day.
    pub fn single_day(day: NaiveDate) -> Self {
        Self { start: day, end: day }
    }

    /// An explicit range, reordered if the caller swapped the endpoints.
    pub fn span(a: NaiveDate, b: NaiveDate) -> Self {
        if b < a {
            Self { start: b, end: a }
        } else {
            Self { start: a, end: b }
        }
    }

    /// The ISO week containing `anchor`: Monday through Sunday. A Sunday
    /// anchor wraps back six days to the preceding Monday.
    pub fn week_of(anchor: NaiveDate) -> Self {
        let monday = anchor - chrono::Duration::days(anchor.weekday().num_days_from_monday() as i64);
        Self {
            start: monday,
            end: monday + chrono::Duration::days(6),
        }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    /// Opening instant of the window.
    pub fn start_at(&self) -> NaiveDateTime {
        self.start.and_hms_opt(0, 0, 0).unwrap()
    }

    /// Closing instant of the window (last representable millisecond).
    pub fn end_at(&self) -> NaiveDateTime {
        self.end.and_hms_milli_opt(23, 59, 59, 999).unwrap()
    }
}
