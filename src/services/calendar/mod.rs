pub mod google;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde_json::{json, Value};

use crate::models::{ActionResult, AvailableSlot, BusyInterval, CalendarDetails, Credential, TimeRange};
use crate::services::scheduling::TOP_SLOTS;

/// The calendar collaborator.
#[async_trait]
pub trait CalendarService: Send + Sync {
    /// Runs one of `create, modify, delete, list, check`.
    async fn perform(
        &self,
        action: &str,
        details: &CalendarDetails,
        user_id: &str,
        credential: &Credential,
    ) -> ActionResult;
}

const DEFAULT_DESCRIPTION: &str = "Created via Voice Assistant";
const GENERIC_TITLE: &str = "Meeting";

/// Title for a new event. A missing or generic title is derived from the
/// description, then from participant names.
pub fn event_title(details: &CalendarDetails) -> String {
    match details.title.as_deref() {
        Some(t) if t != GENERIC_TITLE => return t.to_string(),
        _ => {}
    }

    if let Some(desc) = details.description.as_deref() {
        return format!("{GENERIC_TITLE} - {desc}");
    }

    if !details.participants.is_empty() {
        let names = details
            .participants
            .iter()
            .map(|p| p.split('@').next().unwrap_or(p))
            .collect::<Vec<_>>()
            .join(", ");
        return format!("{GENERIC_TITLE} with {names}");
    }

    GENERIC_TITLE.to_string()
}

/// Participants usable as attendees. Bare names are already part of the title.
pub fn attendee_emails(participants: &[String]) -> Vec<&str> {
    participants
        .iter()
        .map(String::as_str)
        .filter(|p| p.contains('@'))
        .collect()
}

/// Google Calendar event resource.
pub fn build_event(title: &str, details: &CalendarDetails, range: &TimeRange) -> Value {
    let mut event = json!({
        "summary": title,
        "description": details.description.as_deref().unwrap_or(DEFAULT_DESCRIPTION),
        "location": details.location.as_deref().unwrap_or_default(),
        "start": { "dateTime": range.start.to_rfc3339() },
        "end": { "dateTime": range.end.to_rfc3339() },
    });

    let attendees = attendee_emails(&details.participants);
    if !attendees.is_empty() {
        event["attendees"] = attendees
            .iter()
            .map(|email| json!({ "email": email, "responseStatus": "needsAction" }))
            .collect();
    }

    event
}

/// Human form of an event start, e.g. `Tue Oct 20, 3:00 PM`.
pub fn display_time(at: &DateTime<FixedOffset>) -> String {
    at.format("%a %b %-d, %-I:%M %p").to_string()
}

/// Busy intervals of the primary calendar in a free/busy response.
pub fn parse_busy(freebusy: &Value) -> Vec<BusyInterval> {
    freebusy["calendars"]["primary"]["busy"]
        .as_array()
        .map(|busy| {
            busy.iter()
                .filter_map(|b| {
                    Some(BusyInterval {
                        start: DateTime::parse_from_rfc3339(b["start"].as_str()?).ok()?,
                        end: DateTime::parse_from_rfc3339(b["end"].as_str()?).ok()?,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Exact (case-insensitive) title match first, then substring.
pub fn find_by_title<'a>(events: &'a [Value], title: &str) -> Option<&'a Value> {
    let wanted = title.to_lowercase();
    let summary = |e: &Value| e["summary"].as_str().map(str::to_lowercase);

    events
        .iter()
        .find(|e| summary(e).is_some_and(|s| s == wanted))
        .or_else(|| {
            events
                .iter()
                .find(|e| summary(e).is_some_and(|s| s.contains(&wanted)))
        })
}

/// Compact view of an event for listings.
pub fn event_summary(event: &Value) -> Value {
    let when = |side: &str| {
        event[side]["dateTime"]
            .as_str()
            .or_else(|| event[side]["date"].as_str())
            .map(str::to_string)
    };

    json!({
        "id": event["id"],
        "summary": event["summary"],
        "start": when("start"),
        "end": when("end"),
        "location": event["location"].as_str().unwrap_or_default(),
        "attendees": event["attendees"].as_array().map(Vec::len).unwrap_or(0),
    })
}

pub fn availability_result(
    mut slots: impl Iterator<Item = AvailableSlot>,
    busy_count: usize,
) -> ActionResult {
    let top: Vec<AvailableSlot> = slots.by_ref().take(TOP_SLOTS).collect();
    let found = top.len() + slots.count();

    ActionResult::success(
        "availability_checked",
        format!("Found {found} available time slots"),
        json!({ "availableSlots": top, "busyCount": busy_count, "totalSlots": found }),
    )
}
