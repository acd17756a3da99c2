use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::CommandError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionStatus {
    Success,
    Error,
}

/// Outcome of a delegated action, returned verbatim by the router.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionResult {
    pub status: ActionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl ActionResult {
    pub fn success(action: &str, message: impl Into<String>, data: Value) -> Self {
        Self {
            status: ActionStatus::Success,
            action: Some(action.to_string()),
            message: message.into(),
            data,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ActionStatus::Error,
            action: None,
            message: message.into(),
            data: Value::Null,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ActionStatus::Success
    }

    /// Reads a string field from `data`.
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}

impl From<CommandError> for ActionResult {
    fn from(err: CommandError) -> Self {
        ActionResult::error(err.to_string())
    }
}

/// What the command endpoint returns to its caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandReply {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}
