//! Language model client.
//!
//! [`LanguageModel`] is the seam the answer synthesizer calls through;
//! [`OllamaModel`] implements it against a local Ollama server's
//! `POST /api/generate` endpoint with streaming disabled. A call either
//! returns the whole answer or fails; there are no retries.

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::config::LlmConfig;

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Model identifier passed to the inference service (e.g. `"llama3.2"`).
    fn model_name(&self) -> &str;

    /// Generate a completion for a fully assembled prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

pub struct OllamaModel {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl OllamaModel {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            client: builder.build()?,
            url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl LanguageModel for OllamaModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let endpoint = format!("{}/api/generate", self.url);
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });

        debug!("Ollama request to {} ({} prompt chars)", endpoint, prompt.len());

        let response = self
            .client
            .post(&endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    anyhow!("Ollama request timed out: {}", e)
                } else {
                    anyhow!(
                        "Ollama connection error (is Ollama running at {}?): {}",
                        self.url,
                        e
                    )
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Ollama API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        let answer = json
            .get("response")
            .and_then(|r| r.as_str())
            .ok_or_else(|| anyhow!("Invalid Ollama response: missing response field"))?;

        Ok(answer.trim().to_string())
    }
}
