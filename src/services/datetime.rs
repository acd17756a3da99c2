//! Heuristic date/time resolution for loosely formatted phrases such as
//! "tomorrow at 3pm" or "18th Jan". Used when the LLM does not hand back
//! a clean RFC 3339 timestamp.
//!
//! Date rules run in the order of [`DATE_RULES`] and the first match wins. The
//! time of day is scanned independently with [`TIME_PATTERNS`].

use std::sync::LazyLock;

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone,
};
use regex::Regex;

use crate::errors::CommandError;
use crate::models::TimeRange;

pub const DEFAULT_DURATION_MINUTES: i64 = 60;

/// Hour used when a date is known but no time of day was given.
pub const DEFAULT_HOUR: u32 = 14;

/// How far "next <weekday>" moves from today. The named weekday is ignored.
pub const NEXT_WEEKDAY_ADVANCE_DAYS: i64 = 1;

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

const LOCAL_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

static NEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bnext\s+(monday|tuesday|wednesday|thursday|friday|saturday|sunday|week)\b")
        .expect("valid regex")
});

static ORDINAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d{1,2})(?:st|nd|rd|th)\s+(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:tember)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\b",
    )
    .expect("valid regex")
});

/// Time-of-day patterns in precedence order: `H:MM am`, `H am`, `Ham`.
pub static TIME_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    const MERIDIEM: &str = r"(a\.m\.|p\.m\.|(?:a\.m|am|p\.m|pm)\b)";
    [
        Regex::new(&format!(r"(?i)\b(\d{{1,2}}):(\d{{2}})\s*{MERIDIEM}")).expect("valid regex"),
        Regex::new(&format!(r"(?i)\b(\d{{1,2}})\s+{MERIDIEM}")).expect("valid regex"),
        Regex::new(&format!(r"(?i)\b(\d{{1,2}}){MERIDIEM}")).expect("valid regex"),
    ]
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRule {
    Tomorrow,
    NextWeekday,
    OrdinalMonth,
    Absolute,
}

pub const DATE_RULES: [DateRule; 4] = [
    DateRule::Tomorrow,
    DateRule::NextWeekday,
    DateRule::OrdinalMonth,
    DateRule::Absolute,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateMatch {
    /// A calendar day; the time of day still has to be decided.
    Day(NaiveDate),
    /// A full timestamp parsed from the text.
    Instant(DateTime<FixedOffset>),
}

impl DateRule {
    pub fn apply(self, text: &str, now: &DateTime<FixedOffset>) -> Option<DateMatch> {
        let today = now.date_naive();
        match self {
            DateRule::Tomorrow => {
                if !text.to_lowercase().contains("tomorrow") {
                    return None;
                }
                today.checked_add_signed(Duration::days(1)).map(DateMatch::Day)
            }
            DateRule::NextWeekday => {
                if !NEXT_RE.is_match(text) {
                    return None;
                }
                today
                    .checked_add_signed(Duration::days(NEXT_WEEKDAY_ADVANCE_DAYS))
                    .map(DateMatch::Day)
            }
            DateRule::OrdinalMonth => {
                let caps = ORDINAL_RE.captures(text)?;
                let day: u32 = caps[1].parse().ok()?;
                let month = month_number(&caps[2])?;
                NaiveDate::from_ymd_opt(now.year(), month, day).map(DateMatch::Day)
            }
            DateRule::Absolute => parse_direct(text.trim(), *now.offset()),
        }
    }
}

fn month_number(name: &str) -> Option<u32> {
    let prefix: String = name.to_lowercase().chars().take(3).collect();
    MONTHS
        .iter()
        .position(|m| *m == prefix)
        .map(|idx| idx as u32 + 1)
}

fn parse_direct(text: &str, offset: FixedOffset) -> Option<DateMatch> {
    if text.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(DateMatch::Instant(dt));
    }
    for fmt in LOCAL_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return offset
                .from_local_datetime(&naive)
                .single()
                .map(DateMatch::Instant);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
            return Some(DateMatch::Day(date));
        }
    }
    None
}

/// Parses `text` as an absolute timestamp. Local forms are read in `offset`;
/// a bare date means midnight.
pub fn parse_absolute(text: &str, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    match parse_direct(text.trim(), offset)? {
        DateMatch::Instant(dt) => Some(dt),
        DateMatch::Day(day) => offset
            .from_local_datetime(&day.and_time(NaiveTime::MIN))
            .single(),
    }
}

/// First time of day found in `text`, converted to 24-hour time.
pub fn parse_time_of_day(text: &str) -> Option<NaiveTime> {
    TIME_PATTERNS.iter().find_map(|re| {
        let caps = re.captures(text)?;
        let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
        let minute: u32 = if caps.len() == 4 {
            caps.get(2)?.as_str().parse().ok()?
        } else {
            0
        };
        let meridiem = caps.get(caps.len() - 1)?.as_str().to_lowercase();
        let hour = to_24_hour(hour, &meridiem)?;
        NaiveTime::from_hms_opt(hour, minute, 0)
    })
}

fn to_24_hour(hour: u32, meridiem: &str) -> Option<u32> {
    if hour > 12 {
        return None;
    }
    let pm = meridiem.starts_with('p');
    Some(match (pm, hour) {
        (true, 12) => 12,
        (true, h) => h + 12,
        (false, 12) => 0,
        (false, h) => h,
    })
}

fn default_time() -> NaiveTime {
    NaiveTime::from_hms_opt(DEFAULT_HOUR, 0, 0).unwrap_or(NaiveTime::MIN)
}

fn at(
    date: NaiveDate,
    time: NaiveTime,
    offset: FixedOffset,
    text: &str,
) -> Result<DateTime<FixedOffset>, CommandError> {
    offset
        .from_local_datetime(&date.and_time(time))
        .single()
        .ok_or_else(|| CommandError::AmbiguousDate(text.to_string()))
}

/// Resolves `text` against `now`, failing with `AmbiguousDate` when neither a
/// date nor a time of day can be found. Empty text resolves to `now`.
pub fn try_resolve(
    text: &str,
    now: DateTime<FixedOffset>,
) -> Result<DateTime<FixedOffset>, CommandError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(now);
    }

    let date = DATE_RULES.iter().find_map(|rule| rule.apply(text, &now));
    let time = parse_time_of_day(text);

    match (date, time) {
        (Some(DateMatch::Instant(instant)), None) => Ok(instant),
        (Some(DateMatch::Instant(instant)), Some(time)) => {
            at(instant.date_naive(), time, *instant.offset(), text)
        }
        (Some(DateMatch::Day(day)), time) => {
            at(day, time.unwrap_or_else(default_time), *now.offset(), text)
        }
        (None, Some(time)) => at(now.date_naive(), time, *now.offset(), text),
        (None, None) => Err(CommandError::AmbiguousDate(text.to_string())),
    }
}

/// Like [`try_resolve`], but an unusable phrase falls back to `now`.
pub fn resolve(text: &str, now: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    try_resolve(text, now).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "date text not understood, using current time");
        now
    })
}

/// End of an event starting at `start`: the parsed `end` when it is an absolute
/// timestamp not before `start`, else one hour after `start`.
pub fn resolve_end(end: Option<&str>, start: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    end.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| parse_absolute(s, *start.offset()))
        .filter(|e| *e >= start)
        .unwrap_or_else(|| start + Duration::minutes(DEFAULT_DURATION_MINUTES))
}

/// Resolves an event's start/end pair. RFC 3339 starts pass through untouched;
/// anything else goes through the heuristic rules.
pub fn resolve_range(
    start: Option<&str>,
    end: Option<&str>,
    now: DateTime<FixedOffset>,
) -> TimeRange {
    let start_text = start.map(str::trim).unwrap_or("");
    let start = match DateTime::parse_from_rfc3339(start_text) {
        Ok(dt) => dt,
        Err(_) => {
            tracing::debug!(start = start_text, "start is not RFC 3339, resolving heuristically");
            resolve(start_text, now)
        }
    };
    TimeRange::new(start, resolve_end(end, start), DEFAULT_DURATION_MINUTES)
}
