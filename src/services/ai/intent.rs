use chrono::{DateTime, FixedOffset};

use crate::errors::ParseError;
use crate::models::{CommandEnvelope, Intent};
use crate::services::ai::CompletionProvider;

const ACTIONS: &str = "send|draft|reply|search|label|summarize|create|modify|delete|list|check|call";
const SERVICES: &str = "email|calendar|voice";

const ENVELOPE_TEMPLATE: &str = r#"{
  "intent": "<one intent>",
  "action": "<one action>",
  "service": "<one service>",
  "details": {
    "to": "", "subject": "", "body": "", "promptForBody": "", "query": "",
    "messageId": "", "labels": [], "maxResults": null,
    "title": "", "start": "", "end": "", "description": "", "location": "",
    "participants": [], "eventId": "", "duration": null, "days": null, "searchDate": "",
    "phoneNumber": "", "purpose": "", "recipientName": ""
  }
}"#;

/// Builds the single extraction prompt sent to the completion provider.
pub fn build_prompt(raw_text: &str, now: DateTime<FixedOffset>) -> String {
    let intents = Intent::ALL
        .iter()
        .map(Intent::as_str)
        .collect::<Vec<_>>()
        .join("|");
    let offset = now.format("%:z");
    let current = now.format("%A, %Y-%m-%dT%H:%M:%S%:z");

    format!(
        r#"You are an intent parser for a productivity assistant that sends email, manages a calendar and places phone calls. Extract ALL details from the user's command.

Current local time: {current}

Rules:
- Resolve relative dates ("tomorrow", "next monday", "18th Jan") against the current local time.
- Write every timestamp as ISO-8601 with an explicit numeric UTC offset, for example 2026-01-18T15:00:00{offset}. Never use the "Z" suffix.
- If an end time is not stated, leave "end" empty.
- intent must be one of: {intents}
- action must be one of: {ACTIONS}
- service must be one of: {SERVICES}
- Use only the details fields that apply to the service; leave the others empty.

Return ONLY valid JSON (no markdown, no code fences, no extra text) with this shape:
{ENVELOPE_TEMPLATE}

User command:
"{raw_text}"
"#
    )
}

/// Parses a raw command into an envelope. Both provider failures and unreadable
/// responses come back as `ParseError`.
pub async fn parse_command(
    llm: &dyn CompletionProvider,
    raw_text: &str,
    now: DateTime<FixedOffset>,
) -> Result<CommandEnvelope, ParseError> {
    let prompt = build_prompt(raw_text, now);

    let response = llm.complete(&prompt).await.map_err(|e| ParseError {
        raw: String::new(),
        reason: format!("completion request failed: {e:#}"),
    })?;

    let envelope = parse_envelope_response(&response)?;

    tracing::info!(
        intent = envelope.intent.as_str(),
        action = %envelope.action,
        service = envelope.service.as_str(),
        "parsed command"
    );

    Ok(envelope)
}

pub fn parse_envelope_response(response: &str) -> Result<CommandEnvelope, ParseError> {
    let trimmed = response.trim();

    // Try direct parse first
    if let Some(envelope) = envelope_from_str(trimmed) {
        return Ok(envelope);
    }

    // Strip markdown code fences
    let cleaned = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let cleaned = cleaned.strip_suffix("```").unwrap_or(cleaned).trim();

    if let Some(envelope) = envelope_from_str(cleaned) {
        return Ok(envelope);
    }

    // Outermost object embedded in prose
    if let (Some(start), Some(end)) = (cleaned.find('{'), cleaned.rfind('}')) {
        if start < end {
            if let Some(envelope) = envelope_from_str(&cleaned[start..=end]) {
                return Ok(envelope);
            }
        }
    }

    tracing::warn!("completion response is not a command envelope");
    Err(ParseError {
        raw: response.to_string(),
        reason: "expected a JSON object".to_string(),
    })
}

fn envelope_from_str(s: &str) -> Option<CommandEnvelope> {
    serde_json::from_str::<serde_json::Value>(s)
        .ok()
        .and_then(CommandEnvelope::from_value)
}
