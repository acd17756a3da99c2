pub mod gmail;

use async_trait::async_trait;
use base64::Engine;

use crate::models::{ActionResult, Credential, EmailDetails};
use crate::services::ai::{assistant_prompt, CompletionProvider};

/// The email collaborator.
#[async_trait]
pub trait EmailService: Send + Sync {
    /// Runs one of `send, draft, reply, search, label, summarize`.
    async fn perform(
        &self,
        action: &str,
        details: &EmailDetails,
        user_id: &str,
        credential: &Credential,
    ) -> ActionResult;

    /// Sends a system-composed message and returns its id.
    async fn send_notification(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        credential: &Credential,
    ) -> anyhow::Result<String>;
}

/// Bodies shorter than this many words are rewritten by the model.
const MIN_BODY_WORDS: usize = 10;

/// RFC 822 message, base64url-encoded without padding.
pub fn encode_message(headers: &[(&str, &str)], body: &str) -> String {
    let mut message = String::new();
    for (name, value) in headers {
        // Line breaks in a value would start a new header
        let value = value.replace(['\r', '\n'], " ");
        message.push_str(&format!("{name}: {}\r\n", value.trim()));
    }
    message.push_str("\r\n");
    message.push_str(body);

    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(message.as_bytes())
}

pub fn needs_professionalizing(body: Option<&str>, prompt_for_body: Option<&str>) -> bool {
    if prompt_for_body.is_some() {
        return true;
    }
    match body {
        Some(b) => b.split_whitespace().count() < MIN_BODY_WORDS,
        None => true,
    }
}

/// Removes a leading `Subject:` and surrounding quotes from a generated subject.
pub fn clean_subject(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_prefix = match trimmed.get(..8) {
        Some(prefix) if prefix.eq_ignore_ascii_case("subject:") => &trimmed[8..],
        _ => trimmed,
    };
    without_prefix.trim().trim_matches('"').trim().to_string()
}

pub fn reply_subject(original: &str) -> String {
    if original.starts_with("Re:") {
        original.to_string()
    } else {
        format!("Re: {original}")
    }
}

pub async fn generate_subject(
    llm: &dyn CompletionProvider,
    instruction: &str,
) -> anyhow::Result<String> {
    let prompt = format!(
        "Generate a short, professional email subject for this instruction: \"{instruction}\". Output only the subject."
    );
    let subject = llm.complete(&prompt).await?;
    Ok(clean_subject(&subject))
}

pub async fn professionalize_body(
    llm: &dyn CompletionProvider,
    instruction: &str,
    to: &str,
    subject: &str,
) -> anyhow::Result<String> {
    let prompt = assistant_prompt(&format!(
        "Write a professional, concise email body based on this instruction: \"{instruction}\".\n\
         The email is to: {to}\n\
         Subject: {subject}\n\n\
         Output ONLY the body text, no 'Subject:' line or extra commentary."
    ));
    Ok(llm.complete(&prompt).await?.trim().to_string())
}
