use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use tracing::Instrument;

use crate::errors::CommandError;
use crate::models::{ActionResult, CommandEnvelope, CommandReply, Credential, Details, EmailDetails, Service};
use crate::services::ai::intent;
use crate::services::confirmation::{self, Operation};
use crate::services::email_address::{extract_email_and_body, Extraction};
use crate::state::AppState;

pub const NOT_UNDERSTOOD: &str =
    "I didn't understand that command. Try asking me to send an email or schedule a meeting.";

/// Repairs a spoken-style recipient in `to`, or failing that in `body`. The text
/// left over once the address is removed becomes the body.
pub fn normalize_email_details(details: &mut EmailDetails) {
    let source = match (details.to.as_deref(), details.body.as_deref()) {
        (Some(to), _) => to.to_string(),
        (None, Some(body)) => body.to_string(),
        (None, None) => return,
    };

    let Extraction { email, residual } = extract_email_and_body(&source);
    let Some(email) = email else {
        return;
    };

    details.to = Some(email.to_string());
    if !residual.is_empty() {
        details.body = Some(residual);
    }
}

/// Dispatches a parsed envelope to its collaborator and returns the result
/// unchanged.
pub async fn route(
    state: &AppState,
    envelope: CommandEnvelope,
    user_id: &str,
    credential: &Credential,
) -> ActionResult {
    let CommandEnvelope {
        action,
        service,
        details,
        ..
    } = envelope;

    match (service, details) {
        (Service::Email, Details::Email(mut email)) => {
            normalize_email_details(&mut email);
            state.email.perform(&action, &email, user_id, credential).await
        }
        (Service::Calendar, Details::Calendar(calendar)) => {
            state
                .calendar
                .perform(&action, &calendar, user_id, credential)
                .await
        }
        (Service::Voice, Details::Call(call)) => state.calls.perform(&action, &call, user_id).await,
        (service, _) => {
            tracing::warn!(service = service.as_str(), "no collaborator for service");
            CommandError::UnknownService(service.as_str().to_string()).into()
        }
    }
}

/// Full pipeline for one command: parse, route, then the optional
/// confirmation email.
pub async fn process_command(
    state: &AppState,
    text: &str,
    user_id: &str,
    credential: &Credential,
    now: DateTime<FixedOffset>,
) -> CommandReply {
    let command_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("command", %command_id, %user_id);

    async move {
        tracing::info!(%text, "command received");

        let envelope = match intent::parse_command(state.llm.as_ref(), text, now).await {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "could not parse command");
                return CommandReply {
                    success: false,
                    message: NOT_UNDERSTOOD.to_string(),
                    action: None,
                    data: Value::Null,
                };
            }
        };

        let result = route(state, envelope, user_id, credential).await;

        if !result.is_success() {
            tracing::info!(message = %result.message, "command failed");
            return CommandReply {
                success: false,
                message: result.message.clone(),
                action: result.action.clone(),
                data: serde_json::to_value(&result).unwrap_or(Value::Null),
            };
        }

        let mut message = reply_message(&result);

        let operation = result.action.as_deref().and_then(Operation::from_action);
        if let (true, Some(op)) = (confirmation::should_send_confirmation(text), operation) {
            if let Some(to) = confirmation::extract_recipient_email(text) {
                match confirmation::send_confirmation(
                    state.email.as_ref(),
                    op,
                    &result,
                    &to,
                    credential,
                    now,
                )
                .await
                {
                    Ok(message_id) => {
                        tracing::info!(%to, %message_id, "confirmation email sent");
                        message.push_str(&format!(" (Confirmation email sent to {to})"));
                    }
                    Err(e) => tracing::warn!(%to, error = %e, "confirmation email failed"),
                }
            }
        }

        CommandReply {
            success: true,
            message,
            action: result.action.clone(),
            data: serde_json::to_value(&result).unwrap_or(Value::Null),
        }
    }
    .instrument(span)
    .await
}

/// User-facing summary of a successful result.
pub fn reply_message(result: &ActionResult) -> String {
    let count = || result.data["count"].as_u64().unwrap_or(0);

    match result.action.as_deref() {
        Some("email_sent") => {
            let to = result.data_str("to").unwrap_or_default();
            match result.data_str("subject").filter(|s| !s.is_empty()) {
                Some(subject) => format!("Email sent to {to} with subject \"{subject}\""),
                None => format!("Email sent to {to}"),
            }
        }
        Some("email_drafted") => "Email drafted (ready to send)".to_string(),
        Some("emails_found") => format!("Found {} emails", count()),
        Some("emails_summarized") => format!("Summarized {} emails", count()),
        Some("event_created") => format!(
            "Event \"{}\" scheduled",
            result.data_str("title").unwrap_or("Meeting")
        ),
        Some("event_modified") => "Event updated".to_string(),
        Some("event_deleted") => "Event deleted".to_string(),
        Some("events_listed") => format!("Found {} upcoming events", count()),
        Some("availability_checked") => format!(
            "Found {} available time slots",
            result.data["availableSlots"]
                .as_array()
                .map(Vec::len)
                .unwrap_or(0)
        ),
        _ if result.message.is_empty() => "Action completed successfully!".to_string(),
        _ => result.message.clone(),
    }
}
