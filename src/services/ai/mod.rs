pub mod call;
pub mod intent;
pub mod ollama;
pub mod openrouter;

use async_trait::async_trait;

/// Black-box text completion: a prompt in, the model's text out.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

const ASSISTANT_PREAMBLE: &str = "You are a highly efficient personal AI assistant. \
Your goal is to make the user more productive by managing communications, scheduling and phone calls.

Operating principles:
1. Use the email, calendar or calling tools the instruction calls for.
2. Confirm critical details before final execution.
3. Be professional, efficient and helpful.";

/// Wraps a free-form instruction in the assistant persona.
pub fn assistant_prompt(instruction: &str) -> String {
    format!("{ASSISTANT_PREAMBLE}\n\nUSER INSTRUCTION: \"{instruction}\"\n")
}
