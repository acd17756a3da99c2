use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::Json;
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::{CommandReply, Credential};
use crate::services::router;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceCommandRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

/// `Authorization: Bearer <token>` value, if any.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub async fn voice_command(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<VoiceCommandRequest>,
) -> Result<Json<CommandReply>, AppError> {
    let user_id = req.user_id.as_deref().map(str::trim).unwrap_or_default();
    let text = req.text.as_deref().map(str::trim).unwrap_or_default();

    if user_id.is_empty() || text.is_empty() {
        return Err(AppError::BadRequest("User ID and text are required".to_string()));
    }

    let credential = match bearer_token(&headers) {
        Some(token) => Credential::bearer(token),
        None => state.credentials.get_credential(user_id)?,
    };

    let reply = router::process_command(&state, text, user_id, &credential, state.now()).await;
    Ok(Json(reply))
}
