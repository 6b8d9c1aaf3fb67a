// src/scheduling/slot.rs

use chrono::NaiveDate;

/// The unit of double-booking: a calendar day plus an opaque time label
/// ("10:00 AM"). Labels are compared by exact string equality; this type is
/// the single place that equality rule lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub date: NaiveDate,
    pub time: String,
}

impl SlotKey {
    pub fn new(date: NaiveDate, time: impl Into<String>) -> Self {
        let time = time.into().trim().to_string();
        Self { date, time }
    }
}

impl std::fmt::Display for SlotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.date, self.time)
    }
}
