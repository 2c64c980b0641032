//! JSON-over-HTTP calls with retry and exponential backoff.
//!
//! Shared by the remote embedding and answer-generation providers:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use std::time::Duration;
use tracing::warn;

/// Delay before retry number `attempt` (1-based).
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << attempt.saturating_sub(1).min(5))
}

pub fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// A JSON POST target.
pub struct JsonRequest<'a> {
    /// Service name used in error messages (e.g. `"OpenAI"`).
    pub service: &'a str,
    pub url: &'a str,
    /// Extra headers such as `Authorization`.
    pub headers: Vec<(&'static str, String)>,
    pub body: &'a serde_json::Value,
}

/// POST `request.body` and return the parsed JSON response.
pub async fn post_json(
    client: &reqwest::Client,
    request: &JsonRequest<'_>,
    max_retries: u32,
) -> Result<serde_json::Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = backoff_delay(attempt);
            warn!(
                "{} request failed; retry {}/{} in {:?}",
                request.service, attempt, max_retries, delay
            );
            tokio::time::sleep(delay).await;
        }

        let mut builder = client
            .post(request.url)
            .header("Content-Type", "application/json")
            .json(request.body);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }

        match builder.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response.json().await?);
                }

                let body_text = response.text().await.unwrap_or_default();
                if is_retryable(status) {
                    last_err = Some(anyhow::anyhow!(
                        "{} API error {}: {}",
                        request.service,
                        status,
                        body_text
                    ));
                    continue;
                }

                bail!("{} API error {}: {}", request.service, status, body_text);
            }
            Err(e) => {
                last_err = Some(anyhow::anyhow!(
                    "{} connection error ({}): {}",
                    request.service,
                    request.url,
                    e
                ));
            }
        }
    }

    Err(last_err
        .unwrap_or_else(|| anyhow::anyhow!("{} request failed after retries", request.service)))
}

fn is_retryable(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}
