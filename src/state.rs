use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};

use crate::config::AppConfig;
use crate::services::ai::CompletionProvider;
use crate::services::calendar::CalendarService;
use crate::services::calls::CallAgent;
use crate::services::credentials::CredentialStore;
use crate::services::email::EmailService;
use crate::services::sessions::SessionStore;

pub struct AppState {
    pub config: AppConfig,
    pub llm: Arc<dyn CompletionProvider>,
    pub email: Arc<dyn EmailService>,
    pub calendar: Arc<dyn CalendarService>,
    pub calls: CallAgent,
    pub credentials: Box<dyn CredentialStore>,
    pub sessions: Box<dyn SessionStore>,
}

impl AppState {
    /// Current time in the configured reference offset.
    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.config.reference_offset())
    }
}
