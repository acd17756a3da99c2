use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Google OAuth credential used by the email and calendar agents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub email: Option<String>,
    pub expires_at: Option<NaiveDateTime>,
}

impl Credential {
    /// A credential carrying only a bearer token taken from the request.
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            email: None,
            expires_at: None,
        }
    }
}
