use anyhow::Context;
use async_trait::async_trait;
use serde_json::{json, Value};

use super::CompletionProvider;

/// Local completions through Ollama's `/api/generate`.
pub struct OllamaProvider {
    url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(url: String, model: String) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            model,
            client: reqwest::Client::new(),
        }
    }
}

fn generated_text(data: &Value) -> anyhow::Result<String> {
    if let Some(err) = data["error"].as_str() {
        anyhow::bail!("Ollama error: {err}");
    }
    data["response"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("missing response in Ollama reply"))
}

#[async_trait]
impl CompletionProvider for OllamaProvider {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });

        let data: Value = self
            .client
            .post(format!("{}/api/generate", self.url))
            .json(&body)
            .send()
            .await
            .context("failed to reach Ollama")?
            .json()
            .await
            .context("failed to decode Ollama reply")?;

        generated_text(&data)
    }
}
