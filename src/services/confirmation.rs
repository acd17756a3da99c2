use chrono::{DateTime, FixedOffset};
use serde_json::Value;

use crate::models::{ActionResult, Credential};
use crate::services::email::EmailService;
use crate::services::email_address::find_plain_email;

const CONFIRMATION_KEYWORDS: [&str; 8] = [
    "send mail",
    "send email",
    "mail me",
    "email me",
    "notify me",
    "confirm",
    "tell me",
    "let me know",
];

const PREVIEW_CHARS: usize = 200;
const FOOTER: &str = "This is an automated notification from your Voice Assistant.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Email,
    Calendar,
}

/// A completed operation that can be reported by email.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    pub kind: OperationKind,
    pub op: &'static str,
}

impl Operation {
    /// Maps a delegate's result tag to the operation it reports.
    pub fn from_action(action: &str) -> Option<Self> {
        let (kind, op) = match action {
            "email_sent" => (OperationKind::Email, "send"),
            "email_drafted" => (OperationKind::Email, "draft"),
            "emails_found" => (OperationKind::Email, "search"),
            "emails_summarized" => (OperationKind::Email, "summarize"),
            "event_created" => (OperationKind::Calendar, "create"),
            "event_modified" => (OperationKind::Calendar, "modify"),
            "event_deleted" => (OperationKind::Calendar, "delete"),
            "events_listed" => (OperationKind::Calendar, "list"),
            "availability_checked" => (OperationKind::Calendar, "check"),
            _ => return None,
        };
        Some(Self { kind, op })
    }

    pub fn subject(&self) -> String {
        let label = match self.kind {
            OperationKind::Email => "Email Operation",
            OperationKind::Calendar => "Calendar Operation",
        };
        format!("{label}: {}", capitalize(self.op))
    }
}

pub fn should_send_confirmation(text: &str) -> bool {
    let lower = text.to_lowercase();
    CONFIRMATION_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// First literal email address in the command text.
pub fn extract_recipient_email(text: &str) -> Option<String> {
    find_plain_email(text)
}

/// Plain-text notification body for a completed operation.
pub fn render_notification(op: Operation, data: &Value, sent_at: DateTime<FixedOffset>) -> String {
    let stamp = sent_at.format("%a %b %-d %Y, %-I:%M %p");
    let text = |key: &str| data[key].as_str().unwrap_or_default().to_string();
    let or = |key: &str, fallback: &str| {
        data[key]
            .as_str()
            .filter(|s| !s.is_empty())
            .unwrap_or(fallback)
            .to_string()
    };

    match (op.kind, op.op) {
        (OperationKind::Calendar, "create") => format!(
            "Event Created\n\nEvent: {}\nDate & Time: {} to {}\nLocation: {}\nDescription: {}\nParticipants: {}\n\n---\nCreated: {stamp}\n{FOOTER}",
            text("title"),
            format_when(&text("startTime")),
            format_when(&text("endTime")),
            or("location", "Not specified"),
            or("description", "No description"),
            participants(data),
        ),
        (OperationKind::Calendar, "modify") => format!(
            "Event Updated\n\nEvent: {}\nEvent ID: {}\n\n---\nUpdated: {stamp}\n{FOOTER}",
            or("title", "(untitled)"),
            text("eventId"),
        ),
        (OperationKind::Calendar, "delete") => format!(
            "Event Deleted\n\nEvent ID: {}\n\n---\nDeleted: {stamp}\n{FOOTER}",
            text("eventId"),
        ),
        (OperationKind::Calendar, "list") => events_list(data, &stamp.to_string()),
        (OperationKind::Calendar, "check") => availability(data, &stamp.to_string()),
        (OperationKind::Email, "send") => format!(
            "Email Sent Successfully\n\nTo: {}\nSubject: {}\n\nMessage Preview:\n{}\n\n---\nSent: {stamp}\n{FOOTER}",
            text("to"),
            text("subject"),
            preview(data["body"].as_str()),
        ),
        (OperationKind::Email, "draft") => format!(
            "Email Draft Created\n\nTo: {}\nSubject: {}\n\nMessage Preview:\n{}\n\n---\nDraft saved: {stamp}\nThis email is saved as a draft. You can edit and send it later.",
            text("to"),
            text("subject"),
            preview(data["body"].as_str()),
        ),
        (OperationKind::Email, "search") => format!(
            "Email Search Results\n\nQuery: {}\nFound: {} email(s)\n\n---\nSearch completed: {stamp}",
            text("query"),
            data["count"].as_u64().unwrap_or(0),
        ),
        (OperationKind::Email, "summarize") => format!(
            "Email Summary\n\n{}\n\n---\n{stamp}\n{FOOTER}",
            text("summary"),
        ),
        _ => format!(
            "Operation Completed\n\n{}\n\n---\n{stamp}",
            serde_json::to_string_pretty(data).unwrap_or_default()
        ),
    }
}

/// Emails a notification about `result` to `to`, returning the sent message id.
pub async fn send_confirmation(
    email: &dyn EmailService,
    op: Operation,
    result: &ActionResult,
    to: &str,
    credential: &Credential,
    now: DateTime<FixedOffset>,
) -> anyhow::Result<String> {
    let body = render_notification(op, &result.data, now);
    email
        .send_notification(to, &op.subject(), &body, credential)
        .await
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn format_when(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.format("%a, %b %-d, %Y, %I:%M %p").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

fn participants(data: &Value) -> String {
    let list: Vec<&str> = data["participants"]
        .as_array()
        .map(|p| p.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    if list.is_empty() {
        "You".to_string()
    } else {
        list.join(", ")
    }
}

fn preview(body: Option<&str>) -> String {
    match body {
        Some(b) if !b.is_empty() => {
            let mut out: String = b.chars().take(PREVIEW_CHARS).collect();
            if b.chars().count() > PREVIEW_CHARS {
                out.push_str("...");
            }
            out
        }
        _ => "[No content]".to_string(),
    }
}

fn events_list(data: &Value, stamp: &str) -> String {
    let days = data["days"].as_u64().unwrap_or(7);
    let events = data["events"].as_array().cloned().unwrap_or_default();

    let mut body = format!(
        "Upcoming Events (Next {days} days)\n\nFound: {} event(s)\n\n",
        events.len()
    );

    if events.is_empty() {
        body.push_str("No upcoming events scheduled.\n");
    }
    for (i, event) in events.iter().enumerate() {
        body.push_str(&format!(
            "{}. {}\n   When: {}\n",
            i + 1,
            event["summary"].as_str().unwrap_or("(untitled)"),
            format_when(event["start"].as_str().unwrap_or_default())
        ));
        if let Some(location) = event["location"].as_str().filter(|l| !l.is_empty()) {
            body.push_str(&format!("   Where: {location}\n"));
        }
        if let Some(n) = event["attendees"].as_u64().filter(|n| *n > 0) {
            body.push_str(&format!("   Attendees: {n}\n"));
        }
        body.push('\n');
    }

    body.push_str(&format!("---\n{stamp}\n{FOOTER}"));
    body
}

fn availability(data: &Value, stamp: &str) -> String {
    let slots = data["availableSlots"].as_array().cloned().unwrap_or_default();
    let busy = data["busyCount"].as_u64().unwrap_or(0);

    let mut body = format!(
        "Available Time Slots\n\nFound: {} available slot(s)\nBusy times: {busy}\n\n",
        slots.len()
    );

    if slots.is_empty() {
        body.push_str("No available slots found for the requested period.\n");
    }
    for (i, slot) in slots.iter().enumerate() {
        let start = slot["start"].as_str().unwrap_or_default();
        let end = slot["end"].as_str().unwrap_or_default();
        body.push_str(&format!(
            "{}. {} to {}\n\n",
            i + 1,
            format_when(start),
            format_when(end)
        ));
    }

    body.push_str(&format!("---\n{stamp}\n{FOOTER}"));
    body
}
