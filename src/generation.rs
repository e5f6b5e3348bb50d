//! Text-generation provider abstraction.
//!
//! [`GenerationProvider`] consumes ordered role-tagged messages and
//! returns the generated text verbatim. The concrete [`OpenAiGeneration`]
//! calls the OpenAI chat completions API with the same retry policy as
//! the embedding provider.

use anyhow::anyhow;
use async_trait::async_trait;

use crate::config::GenerationConfig;
use crate::error::{Error, Result};
use crate::models::ChatMessage;
use crate::openai;

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Generate a completion for the given messages.
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Generation provider backed by `/v1/chat/completions`.
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAiGeneration {
    client: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f64,
    max_retries: u32,
}

impl OpenAiGeneration {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Ok(Self {
            client: openai::client(config.timeout_secs)?,
            api_key: openai::api_key()?,
            model: config.model.clone(),
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl GenerationProvider for OpenAiGeneration {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
        });

        let json = openai::post_with_retry(
            &self.client,
            &format!("{}/chat/completions", openai::API_BASE),
            &self.api_key,
            &body,
            self.max_retries,
        )
        .await?;

        json.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                Error::Backend(anyhow!("invalid completion response: missing message content"))
            })
    }
}
