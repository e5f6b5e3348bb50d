//! Shared OpenAI API plumbing for the embedding and generation providers.
//!
//! Retry strategy for transient failures:
//! - HTTP 429 (rate limited) and 5xx (server error) -> retry
//! - HTTP 4xx (client error, not 429) -> fail immediately
//! - Network errors -> retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (exponent capped at 2^5)

use std::time::Duration;

use anyhow::anyhow;

use crate::error::{Error, Result};

pub(crate) const API_BASE: &str = "https://api.openai.com/v1";

/// Read the API key from the environment.
pub(crate) fn api_key() -> Result<String> {
    std::env::var("OPENAI_API_KEY")
        .map_err(|_| Error::Backend(anyhow!("OPENAI_API_KEY environment variable not set")))
}

pub(crate) fn client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Error::Backend(e.into()))
}

/// POST a JSON body with retry/backoff, returning the response JSON.
pub(crate) async fn post_with_retry(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    body: &serde_json::Value,
    max_retries: u32,
) -> Result<serde_json::Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let resp = client
            .post(url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await;

        match resp {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    let json: serde_json::Value =
                        response.json().await.map_err(|e| Error::Backend(e.into()))?;
                    return Ok(json);
                }

                let body_text = response.text().await.unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(anyhow!("OpenAI API error {}: {}", status, body_text));
                    continue;
                }

                // Client error (not 429) -- don't retry
                return Err(Error::Backend(anyhow!(
                    "OpenAI API error {}: {}",
                    status,
                    body_text
                )));
            }
            Err(e) => {
                last_err = Some(e.into());
                continue;
            }
        }
    }

    Err(Error::Backend(
        last_err.unwrap_or_else(|| anyhow!("request failed after retries")),
    ))
}
