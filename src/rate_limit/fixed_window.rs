use std::collections::HashMap;
use std::sync::Mutex;

use super::{RateLimitDecision, RateLimiter, Window, now_ms};
use crate::error::RateLimitError;

/// In-process fixed-window counter.
///
/// Increment and check happen under one lock, so concurrent requests for the
/// same identity never read a stale count.
pub struct FixedWindowLimiter {
    window: Window,
    state: Mutex<Counters>,
}

#[derive(Default)]
struct Counters {
    index: u64,
    counts: HashMap<String, u64>,
}

impl FixedWindowLimiter {
    pub fn new(window: Window) -> Self {
        Self {
            window,
            state: Mutex::new(Counters::default()),
        }
    }

    /// Consume a permit at an explicit point in time.
    pub fn check_at(&self, identity: &str, now_ms: u64) -> RateLimitDecision {
        let index = self.window.index_at(now_ms);
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        // Windows are shared by all identities; a new one drops every count.
        if state.index != index {
            state.index = index;
            state.counts.clear();
        }

        let count = state.counts.entry(identity.to_string()).or_insert(0);
        *count += 1;
        self.window.decide(*count, index)
    }
}

impl RateLimiter for FixedWindowLimiter {
    async fn check(&self, identity: &str) -> Result<RateLimitDecision, RateLimitError> {
        Ok(self.check_at(identity, now_ms()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    const DAY_MS: u64 = 86_400_000;

    #[test]
    fn sixth_call_in_window_is_denied() {
        let limiter = FixedWindowLimiter::new(Window::default());
        for expected_remaining in (0..5).rev() {
            let d = limiter.check_at("10.0.0.1", 1_000);
            assert!(d.allowed);
            assert_eq!(d.remaining, expected_remaining);
            assert_eq!(d.limit, 5);
        }
        let d = limiter.check_at("10.0.0.1", 2_000);
        assert!(!d.allowed);
        assert_eq!(d.remaining, 0);
    }

    #[test]
    fn distinct_identity_is_unaffected() {
        let limiter = FixedWindowLimiter::new(Window::default());
        for _ in 0..6 {
            limiter.check_at("10.0.0.1", 1_000);
        }
        let d = limiter.check_at("10.0.0.2", 1_000);
        assert!(d.allowed);
        assert_eq!(d.remaining, 4);
    }

    #[test]
    fn new_window_resets_counts() {
        let limiter = FixedWindowLimiter::new(Window::default());
        for _ in 0..6 {
            limiter.check_at("10.0.0.1", DAY_MS - 1);
        }
        let d = limiter.check_at("10.0.0.1", DAY_MS);
        assert!(d.allowed);
        assert_eq!(d.remaining, 4);
        assert_eq!(d.reset_at_ms, 2 * DAY_MS);
    }

    #[test]
    fn denied_calls_still_consume_permits() {
        let limiter = FixedWindowLimiter::new(Window {
            limit: 1,
            length: Duration::from_secs(60),
        });
        assert!(limiter.check_at("a", 0).allowed);
        assert!(!limiter.check_at("a", 0).allowed);
        assert!(!limiter.check_at("a", 0).allowed);
    }

    #[tokio::test]
    async fn concurrent_checks_grant_exactly_limit() {
        let limiter = Arc::new(FixedWindowLimiter::new(Window {
            limit: 5,
            length: Duration::from_secs(3600),
        }));

        let mut handles = Vec::new();
        for _ in 0..50 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                limiter.check("shared").await.unwrap().allowed
            }));
        }

        let mut granted = 0;
        for h in handles {
            if h.await.unwrap() {
                granted += 1;
            }
        }
        // A window boundary could fall mid-test; a fresh window may grant up to 5 more.
        assert!((5..=10).contains(&granted), "granted {granted}");
    }
}
