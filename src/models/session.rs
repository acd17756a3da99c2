use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Human,
    Ai,
}

impl Speaker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Speaker::Human => "human",
            Speaker::Ai => "ai",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallTurn {
    pub role: Speaker,
    pub text: String,
}

/// State of one outbound call, keyed by the provider's call SID.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallSession {
    pub user_id: String,
    pub purpose: String,
    pub history: Vec<CallTurn>,
    pub started_at: NaiveDateTime,
}

impl CallSession {
    pub fn new(user_id: &str, purpose: &str, started_at: NaiveDateTime) -> Self {
        Self {
            user_id: user_id.to_string(),
            purpose: purpose.to_string(),
            history: Vec::new(),
            started_at,
        }
    }

    pub fn push(&mut self, role: Speaker, text: &str) {
        self.history.push(CallTurn {
            role,
            text: text.trim().to_string(),
        });
    }

    /// `role: text` lines, one per turn.
    pub fn transcript(&self) -> String {
        self.history
            .iter()
            .map(|t| format!("{}: {}", t.role.as_str(), t.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
