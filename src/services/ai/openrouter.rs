use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;

use super::CompletionProvider;

const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// OpenAI-compatible chat completions served by OpenRouter.
pub struct OpenRouterProvider {
    api_key: String,
    model: String,
    referer: String,
    client: reqwest::Client,
}

impl OpenRouterProvider {
    pub fn new(api_key: String, model: String, referer: String) -> Self {
        Self {
            api_key,
            model,
            referer,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenRouterProvider {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": 0.6,
            "max_tokens": 600,
        });

        tracing::debug!(model = %self.model, "calling OpenRouter");

        let resp = self
            .client
            .post(OPENROUTER_URL)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", "voicedesk")
            .json(&body)
            .send()
            .await
            .context("failed to call OpenRouter API")?;

        let status = resp.status();
        let data: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse OpenRouter response")?;

        if !status.is_success() {
            anyhow::bail!("OpenRouter API error ({}): {}", status, data);
        }

        data["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("missing content in OpenRouter response"))
    }
}
