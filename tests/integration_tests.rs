use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone};
use serde_json::{json, Value};
use tower::ServiceExt;

use voicedesk::config::AppConfig;
use voicedesk::db;
use voicedesk::handlers;
use voicedesk::models::{ActionResult, CalendarDetails, Credential, EmailDetails};
use voicedesk::services::ai::CompletionProvider;
use voicedesk::services::calendar::CalendarService;
use voicedesk::services::calls::{CallAgent, CallError, CallHandle, CallProvider};
use voicedesk::services::credentials::SqliteCredentialStore;
use voicedesk::services::datetime;
use voicedesk::services::email::EmailService;
use voicedesk::services::router::NOT_UNDERSTOOD;
use voicedesk::services::sessions::InMemorySessionStore;
use voicedesk::state::AppState;

// ── Mock Providers ──

struct MockLlm;

/// The quoted user command at the end of an intent prompt.
fn command_in(prompt: &str) -> &str {
    let marker = "User command:\n\"";
    let start = prompt.find(marker).map(|i| i + marker.len()).unwrap_or(0);
    let end = prompt.rfind('"').unwrap_or(prompt.len());
    prompt.get(start..end).unwrap_or("")
}

/// The reference time the prompt was built with.
fn prompt_now(prompt: &str) -> DateTime<FixedOffset> {
    let line = prompt
        .lines()
        .find(|l| l.starts_with("Current local time: "))
        .unwrap();
    DateTime::parse_from_rfc3339(line.rsplit(", ").next().unwrap()).unwrap()
}

fn tomorrow_at_three(now: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    let day = now.date_naive() + Duration::days(1);
    now.offset()
        .from_local_datetime(&day.and_time(NaiveTime::from_hms_opt(15, 0, 0).unwrap()))
        .single()
        .unwrap()
}

#[async_trait]
impl CompletionProvider for MockLlm {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        if prompt.starts_with("Summarize the following phone call") {
            return Ok("- Table booked for two at 8pm".to_string());
        }

        if prompt.contains("on a phone call") {
            if prompt.contains("Human's last response: \"bye") {
                return Ok("Thanks, goodbye! [END_CALL]".to_string());
            }
            return Ok("What time would you like?".to_string());
        }

        if !prompt.contains("intent parser") {
            return Ok("Quick update".to_string());
        }

        let command = command_in(prompt).to_lowercase();
        let envelope = if command.contains("schedule a meeting with john@x.com") {
            let start = tomorrow_at_three(prompt_now(prompt));
            json!({
                "intent": "calendar_create",
                "action": "create",
                "service": "calendar",
                "details": {
                    "title": "Meeting with john",
                    "start": start.to_rfc3339(),
                    "end": "",
                    "participants": ["john@x.com"]
                }
            })
        } else if command.contains("standup") {
            json!({
                "intent": "calendar_create",
                "action": "create",
                "service": "calendar",
                "details": { "title": "Standup", "start": "tomorrow at 3pm" }
            })
        } else if command.contains("email rohit") {
            json!({
                "intent": "email_send",
                "action": "send",
                "service": "email",
                "details": { "to": "rohit verma 1569 at gmail.com", "body": "the report is ready" }
            })
        } else if command.contains("fax") {
            json!({ "intent": "unknown", "action": "send", "service": "fax", "details": {} })
        } else if command.contains("call") {
            json!({
                "intent": "voice_call",
                "action": "call",
                "service": "voice",
                "details": { "phoneNumber": "+15550001", "purpose": "book a table", "recipientName": "Luigi's" }
            })
        } else {
            return Ok("Sorry, I am not sure what you mean.".to_string());
        };

        Ok(format!("```json\n{envelope}\n```"))
    }
}

#[derive(Default)]
struct MockEmail {
    performed: Mutex<Vec<(String, EmailDetails)>>,
    notifications: Mutex<Vec<(String, String, String)>>,
    fail_notifications: bool,
}

#[async_trait]
impl EmailService for MockEmail {
    async fn perform(
        &self,
        action: &str,
        details: &EmailDetails,
        _user_id: &str,
        _credential: &Credential,
    ) -> ActionResult {
        self.performed
            .lock()
            .unwrap()
            .push((action.to_string(), details.clone()));
        let to = details.to.clone().unwrap_or_default();
        ActionResult::success(
            "email_sent",
            format!("Email sent to {to}"),
            json!({ "to": to, "subject": "Report", "body": details.body }),
        )
    }

    async fn send_notification(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        _credential: &Credential,
    ) -> anyhow::Result<String> {
        if self.fail_notifications {
            anyhow::bail!("daily sending quota exceeded");
        }
        self.notifications
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string(), body.to_string()));
        Ok("msg-1".to_string())
    }
}

#[derive(Default)]
struct MockCalendar {
    performed: Mutex<Vec<(String, CalendarDetails, String)>>,
}

#[async_trait]
impl CalendarService for MockCalendar {
    async fn perform(
        &self,
        action: &str,
        details: &CalendarDetails,
        _user_id: &str,
        credential: &Credential,
    ) -> ActionResult {
        self.performed.lock().unwrap().push((
            action.to_string(),
            details.clone(),
            credential.access_token.clone(),
        ));
        ActionResult::success(
            "event_created",
            "Event scheduled",
            json!({
                "title": details.title,
                "startTime": details.start,
                "participants": details.participants,
            }),
        )
    }
}

#[derive(Default)]
struct MockCallProvider {
    calls: Mutex<Vec<(String, String, String)>>,
}

#[async_trait]
impl CallProvider for MockCallProvider {
    async fn initiate_call(
        &self,
        phone_number: &str,
        purpose: &str,
        user_id: &str,
    ) -> Result<CallHandle, CallError> {
        self.calls.lock().unwrap().push((
            phone_number.to_string(),
            purpose.to_string(),
            user_id.to_string(),
        ));
        Ok(CallHandle {
            call_sid: "CA_TEST".to_string(),
        })
    }
}

// ── Helpers ──

fn test_config() -> AppConfig {
    AppConfig {
        port: 4000,
        database_url: ":memory:".to_string(),
        llm_provider: "ollama".to_string(),
        llm_api_key: String::new(),
        llm_model: "test".to_string(),
        ollama_url: "http://localhost:11434".to_string(),
        tz_offset_minutes: 330,
        backend_url: "http://localhost:4000".to_string(),
        call_provider: "twilio".to_string(),
        twilio_account_sid: String::new(),
        twilio_auth_token: String::new(), // empty = skip signature validation
        twilio_phone_number: "+15551234567".to_string(),
        exotel_account_sid: String::new(),
        exotel_api_key: String::new(),
        exotel_api_token: String::new(),
        exotel_virtual_number: String::new(),
    }
}

struct Harness {
    state: Arc<AppState>,
    email: Arc<MockEmail>,
    calendar: Arc<MockCalendar>,
    calls: Arc<MockCallProvider>,
}

fn harness_with(config: AppConfig, fail_notifications: bool) -> Harness {
    let conn = db::init_db(":memory:").unwrap();
    let email = Arc::new(MockEmail {
        fail_notifications,
        ..Default::default()
    });
    let calendar = Arc::new(MockCalendar::default());
    let calls = Arc::new(MockCallProvider::default());

    let state = Arc::new(AppState {
        config,
        llm: Arc::new(MockLlm),
        email: email.clone(),
        calendar: calendar.clone(),
        calls: CallAgent::new(calls.clone()),
        credentials: Box::new(SqliteCredentialStore::new(Arc::new(Mutex::new(conn)))),
        sessions: Box::new(InMemorySessionStore::new()),
    });

    Harness {
        state,
        email,
        calendar,
        calls,
    }
}

fn harness() -> Harness {
    harness_with(test_config(), false)
}

fn test_app(state: Arc<AppState>) -> Router {
    handlers::router(state)
}

fn voice_request(body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/voice")
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn form_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send_command(state: &Arc<AppState>, text: &str) -> (StatusCode, Value) {
    let res = test_app(state.clone())
        .oneshot(voice_request(json!({ "userId": "u1", "text": text }), Some("ya29.token")))
        .await
        .unwrap();
    let status = res.status();
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn body_text(res: axum::response::Response) -> String {
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

// ── Health ──

#[tokio::test]
async fn test_health() {
    let h = harness();
    let res = test_app(h.state)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
}

// ── Command endpoint ──

#[tokio::test]
async fn test_voice_requires_user_and_text() {
    let h = harness();
    let res = test_app(h.state)
        .oneshot(voice_request(json!({ "userId": "u1" }), Some("tok")))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_voice_requires_authorization() {
    let h = harness();
    let res = test_app(h.state)
        .oneshot(voice_request(json!({ "userId": "u1", "text": "list my events" }), None))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(h.calendar.performed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_voice_uses_stored_credential() {
    let h = harness();

    let res = test_app(h.state.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/credentials")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    json!({ "userId": "u1", "accessToken": "stored-token", "email": "me@x.com", "expiresIn": 3600 })
                        .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = test_app(h.state.clone())
        .oneshot(voice_request(json!({ "userId": "u1", "text": "Standup tomorrow at 3pm" }), None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let performed = h.calendar.performed.lock().unwrap();
    assert_eq!(performed.len(), 1);
    assert_eq!(performed[0].2, "stored-token");
}

#[tokio::test]
async fn test_schedule_meeting_end_to_end() {
    let h = harness();
    let (status, json) =
        send_command(&h.state, "Schedule a meeting with john@x.com tomorrow at 3pm").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["action"], "event_created");
    assert_eq!(json["message"], "Event \"Meeting with john\" scheduled");

    let performed = h.calendar.performed.lock().unwrap();
    assert_eq!(performed.len(), 1);
    let (action, details, token) = &performed[0];
    assert_eq!(action, "create");
    assert_eq!(token, "ya29.token");
    assert_eq!(details.title.as_deref(), Some("Meeting with john"));
    assert_eq!(details.participants, vec!["john@x.com".to_string()]);
    assert_eq!(details.end, None);

    let now = h.state.now();
    let range = datetime::resolve_range(details.start.as_deref(), details.end.as_deref(), now);
    assert_eq!(range.start, tomorrow_at_three(now));
    assert_eq!(range.end, tomorrow_at_three(now) + Duration::hours(1));
}

#[tokio::test]
async fn test_spoken_time_is_resolved_heuristically() {
    let h = harness();
    let (_, json) = send_command(&h.state, "Standup tomorrow at 3pm").await;
    assert_eq!(json["success"], true);

    let performed = h.calendar.performed.lock().unwrap();
    let details = &performed[0].1;
    assert_eq!(details.start.as_deref(), Some("tomorrow at 3pm"));

    let now = h.state.now();
    let range = datetime::resolve_range(details.start.as_deref(), None, now);
    assert_eq!(range.start, tomorrow_at_three(now));
    assert_eq!(range.end - range.start, Duration::minutes(60));
}

#[tokio::test]
async fn test_email_recipient_is_normalized() {
    let h = harness();
    let (_, json) = send_command(&h.state, "Email rohit verma 1569 at gmail.com the report is ready").await;

    assert_eq!(json["success"], true);
    assert_eq!(
        json["message"],
        "Email sent to rohitverma1569@gmail.com with subject \"Report\""
    );

    let performed = h.email.performed.lock().unwrap();
    let (action, details) = &performed[0];
    assert_eq!(action, "send");
    assert_eq!(details.to.as_deref(), Some("rohitverma1569@gmail.com"));
    assert_eq!(details.body.as_deref(), Some("the report is ready"));
}

#[tokio::test]
async fn test_unparseable_command() {
    let h = harness();
    let (status, json) = send_command(&h.state, "blorp").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], false);
    assert_eq!(json["message"], NOT_UNDERSTOOD);
    assert!(h.calendar.performed.lock().unwrap().is_empty());
    assert!(h.email.performed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_service() {
    let h = harness();
    let (_, json) = send_command(&h.state, "fax the contract to the bank").await;

    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "Could not determine service type: \"fax\"");
}

#[tokio::test]
async fn test_confirmation_email_sent() {
    let h = harness();
    let (_, json) = send_command(&h.state, "Standup tomorrow at 3pm, confirm to me@x.com").await;

    assert_eq!(json["success"], true);
    assert_eq!(
        json["message"],
        "Event \"Standup\" scheduled (Confirmation email sent to me@x.com)"
    );

    let notifications = h.email.notifications.lock().unwrap();
    assert_eq!(notifications.len(), 1);
    let (to, subject, body) = &notifications[0];
    assert_eq!(to, "me@x.com");
    assert_eq!(subject, "Calendar Operation: Create");
    assert!(body.contains("Event: Standup"));
}

#[tokio::test]
async fn test_confirmation_failure_keeps_primary_result() {
    let h = harness_with(test_config(), true);
    let (_, json) = send_command(&h.state, "Standup tomorrow at 3pm, confirm to me@x.com").await;

    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "Event \"Standup\" scheduled");
    assert_eq!(h.calendar.performed.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_call_command() {
    let h = harness();
    let (_, json) = send_command(&h.state, "Call Luigi's and book a table").await;

    assert_eq!(json["success"], true);
    assert_eq!(json["action"], "call_initiated");
    assert_eq!(json["data"]["data"]["callSid"], "CA_TEST");

    let calls = h.calls.calls.lock().unwrap();
    assert_eq!(calls[0].0, "+15550001");
    assert_eq!(calls[0].1, "book a table");
    assert_eq!(calls[0].2, "u1");
}

// ── Live call webhooks ──

#[tokio::test]
async fn test_live_call_flow() {
    let h = harness();
    h.state
        .credentials
        .save_credential(
            "u1",
            &Credential {
                access_token: "tok".to_string(),
                refresh_token: None,
                email: Some("me@x.com".to_string()),
                expires_at: None,
            },
        )
        .unwrap();

    // Callee answers
    let res = test_app(h.state.clone())
        .oneshot(form_request(
            "/voice/call/webhook?purpose=book%20a%20table&userId=u1",
            "CallSid=CA1&CallStatus=in-progress",
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let xml = body_text(res).await;
    assert!(xml.contains("regarding book a table"));
    assert!(xml.contains(r#"<Gather input="speech" action="/voice/call/respond""#));

    // One turn
    let res = test_app(h.state.clone())
        .oneshot(form_request("/voice/call/respond", "CallSid=CA1&SpeechResult=Hello+there"))
        .await
        .unwrap();
    let xml = body_text(res).await;
    assert!(xml.contains("What time would you like?"));
    assert!(xml.contains("<Gather"));

    // Callee says goodbye, model ends the call
    let res = test_app(h.state.clone())
        .oneshot(form_request("/voice/call/respond", "CallSid=CA1&SpeechResult=bye+now"))
        .await
        .unwrap();
    let xml = body_text(res).await;
    assert!(xml.contains("Thanks, goodbye!"));
    assert!(!xml.contains("[END_CALL]"));
    assert!(xml.contains("<Hangup/>"));

    let session = h.state.sessions.get("CA1").unwrap();
    assert_eq!(session.history.len(), 4);

    // Call completes
    let res = test_app(h.state.clone())
        .oneshot(form_request("/voice/call/status", "CallSid=CA1&CallStatus=completed"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    assert!(h.state.sessions.get("CA1").is_none());
    let notifications = h.email.notifications.lock().unwrap();
    assert_eq!(notifications.len(), 1);
    let (to, subject, body) = &notifications[0];
    assert_eq!(to, "me@x.com");
    assert_eq!(subject, "AI Call Summary - book a table");
    assert!(body.contains("- Table booked for two at 8pm"));
    assert!(body.contains("HUMAN: Hello there"));
}

#[tokio::test]
async fn test_status_ignores_intermediate_states() {
    let h = harness();
    test_app(h.state.clone())
        .oneshot(form_request("/voice/call/webhook?purpose=x&userId=u1", "CallSid=CA2"))
        .await
        .unwrap();

    let res = test_app(h.state.clone())
        .oneshot(form_request("/voice/call/status", "CallSid=CA2&CallStatus=ringing"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(h.state.sessions.get("CA2").is_some());
}

#[tokio::test]
async fn test_failed_call_drops_session_without_summary() {
    let h = harness();
    h.state
        .credentials
        .save_credential(
            "u1",
            &Credential {
                access_token: "tok".to_string(),
                refresh_token: None,
                email: Some("me@x.com".to_string()),
                expires_at: None,
            },
        )
        .unwrap();

    for sid in ["CA5", "CA6"] {
        test_app(h.state.clone())
            .oneshot(form_request(
                "/voice/call/webhook?purpose=x&userId=u1",
                &format!("CallSid={sid}"),
            ))
            .await
            .unwrap();
        test_app(h.state.clone())
            .oneshot(form_request(
                "/voice/call/respond",
                &format!("CallSid={sid}&SpeechResult=Hello"),
            ))
            .await
            .unwrap();
    }

    for (sid, status) in [("CA5", "failed"), ("CA6", "canceled")] {
        let res = test_app(h.state.clone())
            .oneshot(form_request(
                "/voice/call/status",
                &format!("CallSid={sid}&CallStatus={status}"),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(h.state.sessions.get(sid).is_none());
    }

    assert!(h.email.notifications.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_respond_without_session_hangs_up() {
    let h = harness();
    let res = test_app(h.state)
        .oneshot(form_request("/voice/call/respond", "CallSid=CA404&SpeechResult=hi"))
        .await
        .unwrap();

    let xml = body_text(res).await;
    assert!(xml.contains("I encountered a system error"));
    assert!(xml.contains("<Hangup/>"));
}

#[tokio::test]
async fn test_webhook_requires_signature_when_configured() {
    let mut config = test_config();
    config.twilio_auth_token = "secret".to_string();
    let h = harness_with(config, false);

    let res = test_app(h.state.clone())
        .oneshot(form_request("/voice/call/webhook?purpose=x&userId=u1", "CallSid=CA3"))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert!(h.state.sessions.get("CA3").is_none());
}
