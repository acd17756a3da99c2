use std::env;

use chrono::{FixedOffset, Offset, Utc};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub llm_provider: String,
    pub llm_api_key: String,
    pub llm_model: String,
    pub ollama_url: String,
    /// Offset of the user's local time from UTC, in minutes.
    pub tz_offset_minutes: i32,
    pub backend_url: String,
    pub call_provider: String,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_phone_number: String,
    pub exotel_account_sid: String,
    pub exotel_api_key: String,
    pub exotel_api_token: String,
    pub exotel_virtual_number: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "voicedesk.db".to_string()),
            llm_provider: env::var("LLM_PROVIDER").unwrap_or_else(|_| "openrouter".to_string()),
            llm_api_key: env::var("OPENROUTER_API_KEY")
                .or_else(|_| env::var("OPENAI_API_KEY"))
                .unwrap_or_default(),
            llm_model: env::var("LLM_MODEL")
                .unwrap_or_else(|_| "openai/gpt-3.5-turbo".to_string()),
            ollama_url: env::var("OLLAMA_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            tz_offset_minutes: env::var("TZ_OFFSET_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(330),
            backend_url: env::var("BACKEND_URL")
                .unwrap_or_else(|_| "http://localhost:4000".to_string()),
            call_provider: env::var("CALL_PROVIDER").unwrap_or_else(|_| "twilio".to_string()),
            twilio_account_sid: env::var("TWILIO_ACCOUNT_SID").unwrap_or_default(),
            twilio_auth_token: env::var("TWILIO_AUTH_TOKEN").unwrap_or_default(),
            twilio_phone_number: env::var("TWILIO_PHONE_NUMBER").unwrap_or_default(),
            exotel_account_sid: env::var("EXOTEL_ACCOUNT_SID").unwrap_or_default(),
            exotel_api_key: env::var("EXOTEL_API_KEY").unwrap_or_default(),
            exotel_api_token: env::var("EXOTEL_API_TOKEN").unwrap_or_default(),
            exotel_virtual_number: env::var("EXOTEL_VIRTUAL_NUMBER").unwrap_or_default(),
        }
    }

    /// The fixed offset used for "now" and for timestamps without an explicit offset.
    /// Falls back to UTC when the configured minutes are out of range.
    pub fn reference_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.tz_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }
}
