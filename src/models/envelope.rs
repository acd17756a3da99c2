use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    EmailSend,
    EmailDraft,
    EmailReply,
    EmailSearch,
    EmailLabel,
    EmailSummarize,
    CalendarCreate,
    CalendarModify,
    CalendarDelete,
    CalendarList,
    CalendarAvailability,
    VoiceCall,
    Unknown,
}

impl Intent {
    pub const ALL: [Intent; 12] = [
        Intent::EmailSend,
        Intent::EmailDraft,
        Intent::EmailReply,
        Intent::EmailSearch,
        Intent::EmailLabel,
        Intent::EmailSummarize,
        Intent::CalendarCreate,
        Intent::CalendarModify,
        Intent::CalendarDelete,
        Intent::CalendarList,
        Intent::CalendarAvailability,
        Intent::VoiceCall,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::EmailSend => "email_send",
            Intent::EmailDraft => "email_draft",
            Intent::EmailReply => "email_reply",
            Intent::EmailSearch => "email_search",
            Intent::EmailLabel => "email_label",
            Intent::EmailSummarize => "email_summarize",
            Intent::CalendarCreate => "calendar_create",
            Intent::CalendarModify => "calendar_modify",
            Intent::CalendarDelete => "calendar_delete",
            Intent::CalendarList => "calendar_list",
            Intent::CalendarAvailability => "calendar_availability",
            Intent::VoiceCall => "voice_call",
            Intent::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        let s = s.trim().to_lowercase();
        Intent::ALL
            .into_iter()
            .find(|i| i.as_str() == s)
            .unwrap_or(Intent::Unknown)
    }

    /// Service implied by the intent tag, if any.
    pub fn service(&self) -> Option<Service> {
        match self {
            Intent::EmailSend
            | Intent::EmailDraft
            | Intent::EmailReply
            | Intent::EmailSearch
            | Intent::EmailLabel
            | Intent::EmailSummarize => Some(Service::Email),
            Intent::CalendarCreate
            | Intent::CalendarModify
            | Intent::CalendarDelete
            | Intent::CalendarList
            | Intent::CalendarAvailability => Some(Service::Calendar),
            Intent::VoiceCall => Some(Service::Voice),
            Intent::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Service {
    Email,
    Calendar,
    Voice,
    Other(String),
}

impl Service {
    pub fn as_str(&self) -> &str {
        match self {
            Service::Email => "email",
            Service::Calendar => "calendar",
            Service::Voice => "voice",
            Service::Other(s) => s.as_str(),
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "email" => Service::Email,
            "calendar" => Service::Calendar,
            "voice" | "voice_call" | "call" => Service::Voice,
            other => Service::Other(other.to_string()),
        }
    }
}

impl Serialize for Service {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmailDetails {
    #[serde(default, deserialize_with = "lenient::string")]
    pub to: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub subject: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub body: Option<String>,
    #[serde(default, alias = "prompt_for_body", deserialize_with = "lenient::string")]
    pub prompt_for_body: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub query: Option<String>,
    #[serde(default, alias = "message_id", deserialize_with = "lenient::string")]
    pub message_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub labels: Vec<String>,
    #[serde(default, alias = "max_results", deserialize_with = "lenient::number")]
    pub max_results: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDetails {
    #[serde(default, deserialize_with = "lenient::string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub start: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub end: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub participants: Vec<String>,
    #[serde(default, alias = "event_id", deserialize_with = "lenient::string")]
    pub event_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub duration: Option<u32>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub days: Option<u32>,
    #[serde(default, alias = "max_results", deserialize_with = "lenient::number")]
    pub max_results: Option<u32>,
    #[serde(default, alias = "search_date", deserialize_with = "lenient::string")]
    pub search_date: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CallDetails {
    #[serde(default, alias = "phone_number", alias = "phone", deserialize_with = "lenient::string")]
    pub phone_number: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub purpose: Option<String>,
    #[serde(default, alias = "recipient_name", deserialize_with = "lenient::string")]
    pub recipient_name: Option<String>,
}

/// Service-specific details. The variant always follows the envelope's `service`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Details {
    Email(EmailDetails),
    Calendar(CalendarDetails),
    Call(CallDetails),
    Unrecognized(Value),
}

impl Details {
    /// Builds the variant for `service` from a raw JSON value. Fields of the wrong
    /// shape are dropped rather than failing the whole envelope.
    pub fn from_value(service: &Service, value: Value) -> Self {
        let value = match value {
            Value::Object(_) => value,
            _ => Value::Object(Default::default()),
        };
        match service {
            Service::Email => Details::Email(serde_json::from_value(value).unwrap_or_default()),
            Service::Calendar => {
                Details::Calendar(serde_json::from_value(value).unwrap_or_default())
            }
            Service::Voice => Details::Call(serde_json::from_value(value).unwrap_or_default()),
            Service::Other(_) => Details::Unrecognized(value),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CommandEnvelope {
    pub intent: Intent,
    pub action: String,
    pub service: Service,
    pub details: Details,
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(default, deserialize_with = "lenient::string")]
    intent: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    action: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    service: Option<String>,
    #[serde(default)]
    details: Value,
}

impl CommandEnvelope {
    /// Builds an envelope from a JSON object. Returns `None` when the value is not an
    /// object. A missing `service` falls back to the one implied by `intent`.
    pub fn from_value(value: Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        let raw: RawEnvelope = serde_json::from_value(value).ok()?;

        let intent = raw.intent.as_deref().map(Intent::parse).unwrap_or(Intent::Unknown);
        let service = match raw.service.as_deref() {
            Some(s) => Service::parse(s),
            None => intent
                .service()
                .unwrap_or_else(|| Service::Other(String::new())),
        };
        let action = raw.action.unwrap_or_default().trim().to_lowercase();
        let details = Details::from_value(&service, raw.details);

        Some(Self {
            intent,
            action,
            service,
            details,
        })
    }
}

/// Deserializers that treat empty strings, nulls and wrong shapes as absent.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
    }

    pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(match value {
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }

    pub fn list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(match value {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                    _ => None,
                })
                .collect(),
            Value::String(s) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        })
    }
}

impl<'de> Deserialize<'de> for CommandEnvelope {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(d)?;
        CommandEnvelope::from_value(value)
            .ok_or_else(|| serde::de::Error::custom("command envelope must be a JSON object"))
    }
}
