use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Form;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha1::Sha1;

use crate::models::{CallSession, Speaker};
use crate::services::ai::call::{next_line_prompt, summary_email, summary_prompt};
use crate::services::twiml::{generate_twiml, strip_end_marker, NextStep, RESPOND_PATH};
use crate::state::AppState;

const SYSTEM_ERROR_LINE: &str = "I'm sorry, I encountered a system error. Goodbye.";
const PROVIDER_ERROR_LINE: &str =
    "I'm having trouble connecting right now. Let me call you back later. Goodbye.";
/// Statuses after which Twilio sends no more webhooks for the call.
const TERMINAL_STATUSES: [&str; 5] = ["completed", "busy", "no-answer", "failed", "canceled"];
/// Terminal statuses that earn the user a summary email.
const SUMMARY_STATUSES: [&str; 3] = ["completed", "busy", "no-answer"];

#[derive(Deserialize)]
pub struct CallQuery {
    pub purpose: Option<String>,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

fn validate_twilio_signature(
    auth_token: &str,
    signature: &str,
    url: &str,
    params: &HashMap<String, String>,
) -> bool {
    // URL followed by every param as key+value, sorted by key
    let mut data = url.to_string();
    let mut sorted_params: Vec<_> = params.iter().collect();
    sorted_params.sort_by(|a, b| a.0.cmp(b.0));
    for (key, value) in sorted_params {
        data.push_str(key);
        data.push_str(value);
    }

    let mut mac = match Hmac::<Sha1>::new_from_slice(auth_token.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(data.as_bytes());
    let expected = base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes());

    expected == signature
}

/// Rejects the request unless it carries a valid `X-Twilio-Signature`. Skipped
/// when no auth token is configured.
fn verify_request(
    state: &AppState,
    headers: &HeaderMap,
    uri: &Uri,
    params: &HashMap<String, String>,
) -> Result<(), Response> {
    if state.config.twilio_auth_token.is_empty() {
        return Ok(());
    }

    let signature = headers
        .get("x-twilio-signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if signature.is_empty() {
        tracing::warn!("missing X-Twilio-Signature header");
        return Err((StatusCode::FORBIDDEN, "Missing signature").into_response());
    }

    // Twilio signs the public URL, so honor proxy headers
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("https");
    let host = headers
        .get("x-forwarded-host")
        .or_else(|| headers.get(header::HOST))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    let url = format!("{proto}://{host}{path}");

    if !validate_twilio_signature(&state.config.twilio_auth_token, signature, &url, params) {
        tracing::warn!(%url, "invalid Twilio signature");
        return Err((StatusCode::FORBIDDEN, "Invalid signature").into_response());
    }

    Ok(())
}

fn twiml_response(xml: String) -> Response {
    ([(header::CONTENT_TYPE, "application/xml")], xml).into_response()
}

fn param<'a>(form: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    form.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// Answer webhook: opens a session and greets the callee.
pub async fn call_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    uri: Uri,
    Query(query): Query<CallQuery>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    if let Err(rejection) = verify_request(&state, &headers, &uri, &form) {
        return rejection;
    }

    let Some(call_sid) = param(&form, "CallSid") else {
        return (StatusCode::BAD_REQUEST, "Missing CallSid").into_response();
    };
    let purpose = query
        .purpose
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or("your request");
    let user_id = query.user_id.as_deref().unwrap_or_default();

    tracing::info!(%call_sid, %purpose, %user_id, "call answered");

    state.sessions.set(
        call_sid,
        CallSession::new(user_id, purpose, state.now().naive_local()),
    );

    let greeting = format!(
        "Hello, I am a personal AI assistant calling on behalf of my user regarding {purpose}. How can I help you?"
    );
    twiml_response(generate_twiml(&greeting, NextStep::Gather(RESPOND_PATH)))
}

/// Speech webhook: one conversational turn.
pub async fn call_respond(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    uri: Uri,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    if let Err(rejection) = verify_request(&state, &headers, &uri, &form) {
        return rejection;
    }

    let call_sid = param(&form, "CallSid").unwrap_or_default();
    let Some(mut session) = state.sessions.get(call_sid) else {
        tracing::error!(%call_sid, "no session for call");
        return twiml_response(generate_twiml(SYSTEM_ERROR_LINE, NextStep::Hangup));
    };

    let speech = param(&form, "SpeechResult").unwrap_or_default();
    tracing::info!(%call_sid, %speech, "callee spoke");
    session.push(Speaker::Human, speech);

    let prompt = next_line_prompt(&session, speech);
    let reply = match state.llm.complete(&prompt).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::error!(%call_sid, error = %e, "live call completion failed");
            state.sessions.set(call_sid, session);
            return twiml_response(generate_twiml(PROVIDER_ERROR_LINE, NextStep::Hangup));
        }
    };

    let (line, ends) = strip_end_marker(&reply);
    session.push(Speaker::Ai, &line);
    state.sessions.set(call_sid, session);

    let next = if ends {
        NextStep::Hangup
    } else {
        NextStep::Gather(RESPOND_PATH)
    };
    twiml_response(generate_twiml(&line, next))
}

/// Status webhook: drops the session once the call is over and, unless it
/// failed or was canceled, emails a summary to the user.
pub async fn call_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    uri: Uri,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    if let Err(rejection) = verify_request(&state, &headers, &uri, &form) {
        return rejection;
    }

    let call_sid = param(&form, "CallSid").unwrap_or_default();
    let status = param(&form, "CallStatus").unwrap_or_default();

    if !TERMINAL_STATUSES.contains(&status) {
        return StatusCode::OK.into_response();
    }

    let Some(session) = state.sessions.delete(call_sid) else {
        return StatusCode::OK.into_response();
    };

    tracing::info!(%call_sid, %status, turns = session.history.len(), "call ended");

    if SUMMARY_STATUSES.contains(&status) && !session.history.is_empty() {
        email_summary(&state, &session, status).await;
    }

    StatusCode::OK.into_response()
}

async fn email_summary(state: &AppState, session: &CallSession, status: &str) {
    let summary = match state.llm.complete(&summary_prompt(session)).await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!(error = %e, "failed to summarize call");
            return;
        }
    };

    let credential = match state.credentials.get_credential(&session.user_id) {
        Ok(credential) => credential,
        Err(e) => {
            tracing::warn!(user_id = %session.user_id, error = %e, "cannot email call summary");
            return;
        }
    };

    let Some(to) = credential.email.clone() else {
        tracing::warn!(user_id = %session.user_id, "no email address on file for call summary");
        return;
    };

    let (subject, body) = summary_email(session, status, &summary);
    match state
        .email
        .send_notification(&to, &subject, &body, &credential)
        .await
    {
        Ok(message_id) => tracing::info!(%to, %message_id, "call summary sent"),
        Err(e) => tracing::error!(%to, error = %e, "failed to send call summary"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(token: &str, url: &str, params: &HashMap<String, String>) -> String {
        let mut data = url.to_string();
        let mut keys: Vec<_> = params.keys().collect();
        keys.sort();
        for k in keys {
            data.push_str(k);
            data.push_str(&params[k]);
        }
        let mut mac = Hmac::<Sha1>::new_from_slice(token.as_bytes()).unwrap();
        mac.update(data.as_bytes());
        base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_signature_validation() {
        let params = HashMap::from([
            ("CallSid".to_string(), "CA1".to_string()),
            ("CallStatus".to_string(), "completed".to_string()),
        ]);
        let url = "https://example.com/voice/call/status";
        let signature = sign("secret", url, &params);

        assert!(validate_twilio_signature("secret", &signature, url, &params));
        assert!(!validate_twilio_signature("other", &signature, url, &params));
        assert!(!validate_twilio_signature(
            "secret",
            &signature,
            "https://example.com/voice/call/respond",
            &params
        ));
    }

    #[test]
    fn test_param_ignores_blank_values() {
        let form = HashMap::from([
            ("CallSid".to_string(), " CA1 ".to_string()),
            ("SpeechResult".to_string(), "  ".to_string()),
        ]);
        assert_eq!(param(&form, "CallSid"), Some("CA1"));
        assert_eq!(param(&form, "SpeechResult"), None);
        assert_eq!(param(&form, "Missing"), None);
    }
}
