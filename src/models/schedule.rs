use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl TimeRange {
    /// Keeps `start <= end`: an end before the start is replaced by `start + default_minutes`.
    pub fn new(start: DateTime<FixedOffset>, end: DateTime<FixedOffset>, default_minutes: i64) -> Self {
        let end = if end < start {
            start + Duration::minutes(default_minutes)
        } else {
            end
        };
        Self { start, end }
    }
}

/// A busy period reported by a free/busy query.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BusyInterval {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl BusyInterval {
    pub fn overlaps(&self, start: &DateTime<FixedOffset>, end: &DateTime<FixedOffset>) -> bool {
        *start < self.end && *end > self.start
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AvailableSlot {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub display_time: String,
}

impl AvailableSlot {
    pub fn new(start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> Self {
        Self {
            start,
            end,
            display_time: start.format("%a %b %-d, %-I:%M %p").to_string(),
        }
    }
}
