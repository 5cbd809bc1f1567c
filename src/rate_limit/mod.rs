//! Fixed-window rate limiting keyed by client identity.
//!
//! Two backends implement [`RateLimiter`]: a Redis counter reached over the
//! Upstash REST API, shared by every instance of the service, and an
//! in-process counter for single-instance deployments and tests. With neither
//! configured, [`Limiter::from_config`] returns `None` and requests run
//! unlimited.

mod fixed_window;
mod upstash;

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::RateLimitConfig;
use crate::error::RateLimitError;

pub use fixed_window::FixedWindowLimiter;
pub use upstash::UpstashLimiter;

/// Identity used when the client address cannot be determined.
pub const UNKNOWN_IDENTITY: &str = "unknown";

pub const DEFAULT_LIMIT: u32 = 5;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Outcome of a single quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Unix epoch milliseconds at which the current window ends.
    pub reset_at_ms: u64,
}

/// A fixed window of `limit` permits per `length`.
///
/// Windows are aligned to the Unix epoch, so every identity shares the same
/// boundaries.
#[derive(Debug, Clone, Copy)]
pub struct Window {
    pub limit: u32,
    pub length: Duration,
}

impl Default for Window {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            length: DEFAULT_WINDOW,
        }
    }
}

impl Window {
    pub fn length_ms(&self) -> u64 {
        (self.length.as_millis() as u64).max(1)
    }

    pub fn index_at(&self, now_ms: u64) -> u64 {
        now_ms / self.length_ms()
    }

    /// Decide from the post-increment count of the window `index`.
    pub fn decide(&self, count: u64, index: u64) -> RateLimitDecision {
        RateLimitDecision {
            allowed: count <= u64::from(self.limit),
            limit: self.limit,
            remaining: u64::from(self.limit).saturating_sub(count) as u32,
            reset_at_ms: (index + 1) * self.length_ms(),
        }
    }
}

/// Consumes one permit for `identity` and reports whether the call may proceed.
///
/// The permit is spent on every call, allowed or not.
pub trait RateLimiter {
    fn check(
        &self,
        identity: &str,
    ) -> impl Future<Output = Result<RateLimitDecision, RateLimitError>> + Send;
}

/// The configured limiter backend.
pub enum Limiter {
    Upstash(UpstashLimiter),
    InMemory(FixedWindowLimiter),
}

impl Limiter {
    /// Pick a backend from configuration.
    ///
    /// Upstash credentials win over the in-memory flag; with neither the
    /// service runs in permissive mode.
    pub fn from_config(config: &RateLimitConfig) -> Option<Self> {
        let window = Window {
            limit: config.limit,
            length: Duration::from_secs(config.window_secs),
        };

        match (&config.redis_rest_url, &config.redis_rest_token) {
            (Some(url), Some(token)) if !url.is_empty() && !token.is_empty() => Some(
                Limiter::Upstash(UpstashLimiter::new(url.clone(), token.clone(), window)),
            ),
            _ if config.in_memory => Some(Limiter::InMemory(FixedWindowLimiter::new(window))),
            _ => None,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Limiter::Upstash(_) => "upstash",
            Limiter::InMemory(_) => "in-memory",
        }
    }
}

impl RateLimiter for Limiter {
    async fn check(&self, identity: &str) -> Result<RateLimitDecision, RateLimitError> {
        match self {
            Limiter::Upstash(l) => l.check(identity).await,
            Limiter::InMemory(l) => l.check(identity).await,
        }
    }
}

pub(crate) fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_decisions() {
        let window = Window::default();
        let d = window.decide(1, 0);
        assert!(d.allowed);
        assert_eq!(d.remaining, 4);
        assert_eq!(d.reset_at_ms, 86_400_000);

        let d = window.decide(5, 0);
        assert!(d.allowed);
        assert_eq!(d.remaining, 0);

        let d = window.decide(6, 3);
        assert!(!d.allowed);
        assert_eq!(d.remaining, 0);
        assert_eq!(d.reset_at_ms, 4 * 86_400_000);
    }

    #[test]
    fn window_index_is_epoch_aligned() {
        let window = Window {
            limit: 1,
            length: Duration::from_secs(60),
        };
        assert_eq!(window.index_at(0), 0);
        assert_eq!(window.index_at(59_999), 0);
        assert_eq!(window.index_at(60_000), 1);
    }

    #[test]
    fn from_config_without_backend_is_permissive() {
        let config = RateLimitConfig::default();
        assert!(Limiter::from_config(&config).is_none());
    }

    #[test]
    fn from_config_prefers_upstash() {
        let config = RateLimitConfig {
            redis_rest_url: Some("https://example.upstash.io".into()),
            redis_rest_token: Some("token".into()),
            in_memory: true,
            ..Default::default()
        };
        let limiter = Limiter::from_config(&config).unwrap();
        assert_eq!(limiter.backend_name(), "upstash");
    }

    #[test]
    fn from_config_in_memory() {
        let config = RateLimitConfig {
            in_memory: true,
            redis_rest_url: Some("https://example.upstash.io".into()),
            redis_rest_token: None,
            ..Default::default()
        };
        let limiter = Limiter::from_config(&config).unwrap();
        assert_eq!(limiter.backend_name(), "in-memory");
    }

    #[tokio::test]
    async fn limiter_enum_dispatches() {
        let limiter = Limiter::InMemory(FixedWindowLimiter::new(Window::default()));
        let d = limiter.check("1.2.3.4").await.unwrap();
        assert!(d.allowed);
        assert_eq!(d.remaining, 4);
    }
}
