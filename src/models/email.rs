use std::fmt;

use serde::{Deserialize, Serialize};

/// An address recovered from free or voice-transcribed text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractedEmail {
    pub local_part: String,
    pub domain: String,
}

impl ExtractedEmail {
    pub fn new(local_part: &str, domain: &str) -> Self {
        Self {
            local_part: local_part.chars().filter(|c| !c.is_whitespace()).collect(),
            domain: domain.trim().to_lowercase(),
        }
    }
}

impl fmt::Display for ExtractedEmail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.local_part, self.domain)
    }
}
