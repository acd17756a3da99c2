use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde_json::{json, Value};

use super::{
    availability_result, build_event, display_time, event_summary, event_title, find_by_title,
    parse_busy, CalendarService,
};
use crate::errors::CommandError;
use crate::models::{ActionResult, CalendarDetails, Credential};
use crate::services::datetime::{self, DEFAULT_DURATION_MINUTES};
use crate::services::google_api::{error_message, read_json};
use crate::services::scheduling::find_slots;

const CALENDAR_URL: &str = "https://www.googleapis.com/calendar/v3";
const API: &str = "Calendar API";

const LIST_DAYS: u32 = 7;
const LIST_MAX: u32 = 10;
const LIST_CAP: u32 = 250;
const TITLE_SEARCH_DAYS: i64 = 30;
const TITLE_SEARCH_MAX: u32 = 100;
/// Longest window `list` and `check` will query.
const MAX_WINDOW_DAYS: u32 = 90;

/// Requested window length in days, defaulted and capped.
fn window_days(details: &CalendarDetails) -> u32 {
    details.days.unwrap_or(LIST_DAYS).min(MAX_WINDOW_DAYS)
}

fn window_end(start: DateTime<FixedOffset>, days: u32) -> anyhow::Result<DateTime<FixedOffset>> {
    start
        .checked_add_signed(Duration::days(i64::from(days)))
        .with_context(|| format!("a {days}-day window from {start} is out of range"))
}

/// Google Calendar REST client working on the user's primary calendar.
pub struct GoogleCalendarAgent {
    client: reqwest::Client,
    base_url: String,
    offset: FixedOffset,
}

impl GoogleCalendarAgent {
    pub fn new(offset: FixedOffset) -> Self {
        Self::with_base_url(offset, CALENDAR_URL.to_string())
    }

    pub fn with_base_url(offset: FixedOffset, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            offset,
        }
    }

    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }

    fn events_url(&self) -> String {
        format!("{}/calendars/primary/events", self.base_url)
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> anyhow::Result<Value> {
        let resp = req.send().await.with_context(|| format!("failed to call {API}"))?;
        read_json(resp, API).await
    }

    async fn list_window(
        &self,
        token: &str,
        from: DateTime<FixedOffset>,
        to: DateTime<FixedOffset>,
        max: u32,
    ) -> anyhow::Result<Vec<Value>> {
        let req = self.client.get(self.events_url()).bearer_auth(token).query(&[
            ("timeMin", from.to_rfc3339()),
            ("timeMax", to.to_rfc3339()),
            ("maxResults", max.to_string()),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
        ]);
        let data = self.send(req).await?;
        Ok(data["items"].as_array().cloned().unwrap_or_default())
    }

    async fn create(&self, details: &CalendarDetails, token: &str) -> anyhow::Result<ActionResult> {
        let title = event_title(details);
        let range = datetime::resolve_range(details.start.as_deref(), details.end.as_deref(), self.now());
        let event = build_event(&title, details, &range);

        tracing::info!(%title, start = %range.start, "creating event");

        let req = self
            .client
            .post(self.events_url())
            .bearer_auth(token)
            .query(&[("sendUpdates", "all")])
            .json(&event);
        let created = self.send(req).await?;

        Ok(ActionResult::success(
            "event_created",
            format!("Event \"{title}\" scheduled for {}", display_time(&range.start)),
            json!({
                "title": title,
                "startTime": range.start,
                "endTime": range.end,
                "participants": details.participants,
                "location": details.location,
                "description": details.description,
                "eventId": created["id"],
                "eventLink": created["htmlLink"],
            }),
        ))
    }

    async fn modify(&self, details: &CalendarDetails, token: &str) -> anyhow::Result<ActionResult> {
        let Some(event_id) = details.event_id.as_deref() else {
            return Ok(ActionResult::error("Event ID is required"));
        };
        let url = format!("{}/{event_id}", self.events_url());

        let mut event = self.send(self.client.get(&url).bearer_auth(token)).await?;

        if let Some(title) = details.title.as_deref() {
            event["summary"] = json!(title);
        }
        if let Some(description) = details.description.as_deref() {
            event["description"] = json!(description);
        }
        if let Some(location) = details.location.as_deref() {
            event["location"] = json!(location);
        }
        if details.start.is_some() || details.end.is_some() {
            let range =
                datetime::resolve_range(details.start.as_deref(), details.end.as_deref(), self.now());
            event["start"] = json!({ "dateTime": range.start.to_rfc3339() });
            event["end"] = json!({ "dateTime": range.end.to_rfc3339() });
        }

        let req = self
            .client
            .put(&url)
            .bearer_auth(token)
            .query(&[("sendUpdates", "all")])
            .json(&event);
        let updated = self.send(req).await?;

        Ok(ActionResult::success(
            "event_modified",
            "Event updated successfully",
            json!({ "eventId": updated["id"], "title": updated["summary"] }),
        ))
    }

    async fn delete(&self, details: &CalendarDetails, token: &str) -> anyhow::Result<ActionResult> {
        let event_id = match (details.event_id.as_deref(), details.title.as_deref()) {
            (Some(id), _) => id.to_string(),
            (None, Some(title)) => {
                let now = self.now();
                let events = self
                    .list_window(token, now, now + Duration::days(TITLE_SEARCH_DAYS), TITLE_SEARCH_MAX)
                    .await?;
                match find_by_title(&events, title).and_then(|e| e["id"].as_str()) {
                    Some(id) => {
                        tracing::info!(%title, event_id = %id, "found event by title");
                        id.to_string()
                    }
                    None => {
                        return Ok(ActionResult::error(format!(
                            "Could not find event \"{title}\". Please check the event name or provide an event ID."
                        )))
                    }
                }
            }
            (None, None) => {
                return Ok(ActionResult::error(
                    "Event ID or title is required to delete an event",
                ))
            }
        };

        let resp = self
            .client
            .delete(format!("{}/{event_id}", self.events_url()))
            .bearer_auth(token)
            .query(&[("sendUpdates", "all")])
            .send()
            .await
            .with_context(|| format!("failed to call {API}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let data: Value = resp.json().await.unwrap_or(Value::Null);
            anyhow::bail!("{API} error ({status}): {}", error_message(&data));
        }

        let label = details.title.as_deref().unwrap_or("event");
        Ok(ActionResult::success(
            "event_deleted",
            format!("Event \"{label}\" deleted successfully"),
            json!({ "eventId": event_id }),
        ))
    }

    async fn list(&self, details: &CalendarDetails, token: &str) -> anyhow::Result<ActionResult> {
        let days = window_days(details);
        let max = details.max_results.unwrap_or(LIST_MAX).min(LIST_CAP);
        let now = self.now();

        let events = self
            .list_window(token, now, window_end(now, days)?, max)
            .await?;
        let listed: Vec<Value> = events.iter().map(event_summary).collect();

        Ok(ActionResult::success(
            "events_listed",
            format!("Found {} upcoming events in the next {days} days", listed.len()),
            json!({ "count": listed.len(), "days": days, "events": listed }),
        ))
    }

    async fn check(&self, details: &CalendarDetails, token: &str) -> anyhow::Result<ActionResult> {
        let now = self.now();
        let days = window_days(details);
        let duration = details
            .duration
            .map(i64::from)
            .unwrap_or(DEFAULT_DURATION_MINUTES);

        let window_start = details
            .search_date
            .as_deref()
            .map(|s| datetime::resolve(s, now))
            .unwrap_or(now);
        let window_end = window_end(window_start, days)?;

        let mut items = vec![json!({ "id": "primary" })];
        items.extend(details.participants.iter().map(|p| json!({ "id": p })));

        let req = self
            .client
            .post(format!("{}/freeBusy", self.base_url))
            .bearer_auth(token)
            .json(&json!({
                "timeMin": now.to_rfc3339(),
                "timeMax": window_end.to_rfc3339(),
                "items": items,
            }));
        let freebusy = self.send(req).await?;
        let busy = parse_busy(&freebusy);

        let slots = find_slots(window_start, window_end, &busy, duration);
        Ok(availability_result(slots, busy.len()))
    }

    async fn dispatch(&self, action: &str, details: &CalendarDetails, token: &str) -> anyhow::Result<ActionResult> {
        match action {
            "create" => self.create(details, token).await,
            "modify" => self.modify(details, token).await,
            "delete" => self.delete(details, token).await,
            "list" => self.list(details, token).await,
            "check" => self.check(details, token).await,
            other => Ok(CommandError::UnknownAction {
                service: "calendar".to_string(),
                action: other.to_string(),
            }
            .into()),
        }
    }
}

#[async_trait]
impl CalendarService for GoogleCalendarAgent {
    async fn perform(
        &self,
        action: &str,
        details: &CalendarDetails,
        user_id: &str,
        credential: &Credential,
    ) -> ActionResult {
        if credential.access_token.is_empty() {
            return ActionResult::error("No access token provided");
        }

        tracing::info!(%action, %user_id, title = ?details.title, "calendar action");

        match self.dispatch(action, details, &credential.access_token).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(%action, error = %e, "calendar action failed");
                ActionResult::error(format!("Failed to {action} event: {e:#}"))
            }
        }
    }
}
