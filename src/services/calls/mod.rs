pub mod exotel;
pub mod twilio;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::errors::CommandError;
use crate::models::{ActionResult, CallDetails};

pub const DEFAULT_PURPOSE: &str = "Identify as an AI assistant and help with the user's request";

const UNVERIFIED_MESSAGE: &str = "I can only call verified numbers in this development environment. \
Please verify the number with the call provider first.";

/// Twilio's "unverified number on a trial account" error code.
const TWILIO_UNVERIFIED_CODE: i64 = 21219;

#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("number not verified: {0}")]
    UnverifiedNumber(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallHandle {
    pub call_sid: String,
}

/// Places outbound calls whose media is driven by the call webhooks.
#[async_trait]
pub trait CallProvider: Send + Sync {
    async fn initiate_call(
        &self,
        phone_number: &str,
        purpose: &str,
        user_id: &str,
    ) -> Result<CallHandle, CallError>;
}

/// Webhook the provider fetches once the callee answers.
pub fn answer_url(backend_url: &str, purpose: &str, user_id: &str) -> String {
    format!(
        "{}/voice/call/webhook?purpose={}&userId={}",
        backend_url.trim_end_matches('/'),
        urlencoding::encode(purpose),
        urlencoding::encode(user_id)
    )
}

pub fn status_url(backend_url: &str) -> String {
    format!("{}/voice/call/status", backend_url.trim_end_matches('/'))
}

/// Maps a provider rejection to `UnverifiedNumber` when it is about an
/// unverified destination.
pub fn classify_failure(provider: &str, code: Option<i64>, message: &str) -> CallError {
    if code == Some(TWILIO_UNVERIFIED_CODE) || message.to_lowercase().contains("not verified") {
        CallError::UnverifiedNumber(message.to_string())
    } else {
        CallError::Other(anyhow::anyhow!("{provider} API error: {message}"))
    }
}

/// The voice collaborator.
#[derive(Clone)]
pub struct CallAgent {
    provider: Arc<dyn CallProvider>,
}

impl CallAgent {
    pub fn new(provider: Arc<dyn CallProvider>) -> Self {
        Self { provider }
    }

    pub async fn perform(&self, action: &str, details: &CallDetails, user_id: &str) -> ActionResult {
        if action != "call" {
            return CommandError::UnknownAction {
                service: "voice".to_string(),
                action: action.to_string(),
            }
            .into();
        }

        let Some(phone_number) = details.phone_number.as_deref() else {
            return ActionResult::error("Please provide a phone number to call.");
        };
        let purpose = details.purpose.as_deref().unwrap_or(DEFAULT_PURPOSE);

        tracing::info!(%phone_number, %purpose, %user_id, "initiating call");

        match self.provider.initiate_call(phone_number, purpose, user_id).await {
            Ok(handle) => {
                tracing::info!(call_sid = %handle.call_sid, "call initiated");
                let callee = details.recipient_name.as_deref().unwrap_or(phone_number);
                let regarding = details.purpose.as_deref().unwrap_or("your request");
                ActionResult::success(
                    "call_initiated",
                    format!("Okay, I'm calling {callee} right now regarding {regarding}."),
                    json!({
                        "callSid": handle.call_sid,
                        "phoneNumber": phone_number,
                        "purpose": purpose,
                    }),
                )
            }
            Err(CallError::UnverifiedNumber(reason)) => {
                tracing::warn!(%phone_number, %reason, "call rejected for unverified number");
                ActionResult::error(UNVERIFIED_MESSAGE)
            }
            Err(CallError::Other(e)) => {
                tracing::error!(%phone_number, error = %e, "call failed");
                CommandError::Delegate(format!("Failed to initiate call: {e:#}")).into()
            }
        }
    }
}
