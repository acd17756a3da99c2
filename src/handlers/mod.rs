pub mod auth;
pub mod calls;
pub mod health;
pub mod voice;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/voice", post(voice::voice_command))
        .route("/voice/call/webhook", post(calls::call_webhook))
        .route("/voice/call/respond", post(calls::call_respond))
        .route("/voice/call/status", post(calls::call_status))
        .route("/auth/credentials", post(auth::save_credentials))
        .with_state(state)
}
