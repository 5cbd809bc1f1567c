use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{RateLimitDecision, RateLimiter, Window, now_ms};
use crate::error::RateLimitError;

const KEY_PREFIX: &str = "roomify:ratelimit";

/// Fixed-window counter stored in Redis, reached through the Upstash REST API.
///
/// Each check is one pipeline: `INCR` on the window's key, then `PEXPIRE` so
/// stale windows clean themselves up. `INCR` is atomic on the server, which
/// makes the count safe across instances.
pub struct UpstashLimiter {
    client: Client,
    base_url: String,
    token: String,
    window: Window,
}

#[derive(Debug, Deserialize)]
struct PipelineEntry {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

impl UpstashLimiter {
    pub fn new(base_url: String, token: String, window: Window) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            window,
        }
    }

    fn key(identity: &str, index: u64) -> String {
        format!("{KEY_PREFIX}:{identity}:{index}")
    }

    /// Consume a permit at an explicit point in time.
    pub async fn check_at(
        &self,
        identity: &str,
        now_ms: u64,
    ) -> Result<RateLimitDecision, RateLimitError> {
        let index = self.window.index_at(now_ms);
        let key = Self::key(identity, index);
        let commands = json!([
            ["INCR", key],
            ["PEXPIRE", key, self.window.length_ms().to_string()],
        ]);

        let response = self
            .client
            .post(format!("{}/pipeline", self.base_url))
            .bearer_auth(&self.token)
            .json(&commands)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(RateLimitError::Backend {
                status: status.as_u16(),
                message,
            });
        }

        let entries = response.json::<Vec<PipelineEntry>>().await?;
        let incr = entries
            .first()
            .ok_or_else(|| RateLimitError::Protocol("empty pipeline response".into()))?;
        if let Some(err) = &incr.error {
            return Err(RateLimitError::Protocol(format!("INCR failed: {err}")));
        }
        let count = incr
            .result
            .as_ref()
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| RateLimitError::Protocol("INCR returned no integer".into()))?;

        Ok(self.window.decide(count, index))
    }
}

impl RateLimiter for UpstashLimiter {
    async fn check(&self, identity: &str) -> Result<RateLimitDecision, RateLimitError> {
        self.check_at(identity, now_ms()).await
    }
}
