use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::models::Credential;
use crate::state::AppState;

/// Tokens obtained by the frontend's Google consent flow.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveCredentialRequest {
    pub user_id: String,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Seconds until the access token expires.
    #[serde(default)]
    pub expires_in: Option<i64>,
}

pub async fn save_credentials(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SaveCredentialRequest>,
) -> Result<Json<Value>, AppError> {
    if req.user_id.trim().is_empty() || req.access_token.trim().is_empty() {
        return Err(AppError::BadRequest(
            "userId and accessToken are required".to_string(),
        ));
    }

    let credential = Credential {
        access_token: req.access_token.trim().to_string(),
        refresh_token: req.refresh_token.filter(|t| !t.is_empty()),
        email: req.email.filter(|e| !e.is_empty()),
        expires_at: req
            .expires_in
            .map(|secs| Utc::now().naive_utc() + Duration::seconds(secs)),
    };

    state
        .credentials
        .save_credential(req.user_id.trim(), &credential)?;

    Ok(Json(json!({ "success": true })))
}
