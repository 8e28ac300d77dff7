//! Login rate limiter
//!
//! Per-key sliding window over failed sign-in attempts. Every mutation of a
//! key happens while holding that key's map entry, so a window reset and the
//! following increment are one atomic step.

use bazaar_common::{Clock, SystemClock};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Limiter parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitPolicy {
    /// Failures within one window that trigger a block
    pub max_attempts: u32,
    /// Window length in seconds
    pub window_secs: i64,
    /// Block length in seconds
    pub block_secs: i64,
    /// How long an expired block is kept before cleanup evicts it
    pub cleanup_grace_secs: i64,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_secs: 60,
            block_secs: 300,
            cleanup_grace_secs: 60,
        }
    }
}

impl RateLimitPolicy {
    fn window(&self) -> Duration {
        Duration::seconds(self.window_secs)
    }

    fn block(&self) -> Duration {
        Duration::seconds(self.block_secs)
    }
}

#[derive(Debug, Clone)]
struct AttemptRecord {
    window_start: DateTime<Utc>,
    failure_count: u32,
    blocked_until: Option<DateTime<Utc>>,
}

impl AttemptRecord {
    fn new(now: DateTime<Utc>) -> Self {
        Self { window_start: now, failure_count: 0, blocked_until: None }
    }

    fn is_blocked(&self, now: DateTime<Utc>) -> bool {
        self.blocked_until.is_some_and(|until| now < until)
    }

    fn block_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.blocked_until.is_some_and(|until| now >= until)
    }

    fn window_expired(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now > self.window_start + window
    }

    /// Record no longer affects decisions and may be dropped
    fn has_lapsed(&self, now: DateTime<Utc>, window: Duration) -> bool {
        match self.blocked_until {
            Some(until) => now >= until,
            None => self.window_expired(now, window),
        }
    }

    fn is_evictable(&self, now: DateTime<Utc>, policy: &RateLimitPolicy) -> bool {
        match self.blocked_until {
            Some(until) => now > until + Duration::seconds(policy.cleanup_grace_secs),
            None => now > self.window_start + policy.window() * 2,
        }
    }
}

/// In-memory login rate limiter
pub struct LoginRateLimiter {
    attempts: DashMap<String, AttemptRecord>,
    policy: RateLimitPolicy,
    clock: Arc<dyn Clock>,
}

impl LoginRateLimiter {
    /// Limiter on the system clock
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    /// Limiter on an injected clock
    pub fn with_clock(policy: RateLimitPolicy, clock: Arc<dyn Clock>) -> Self {
        Self { attempts: DashMap::new(), policy, clock }
    }

    /// Active policy
    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Whether `key` may attempt a sign-in right now
    pub fn is_allowed(&self, key: &str) -> bool {
        let now = self.clock.now();
        let window = self.policy.window();

        if self.attempts.remove_if(key, |_, rec| rec.has_lapsed(now, window)).is_some() {
            tracing::debug!(key, "login attempt record expired");
            return true;
        }

        match self.attempts.get(key) {
            None => true,
            Some(rec) => !rec.is_blocked(now) && rec.failure_count < self.policy.max_attempts,
        }
    }

    /// Count a failed sign-in for `key`
    pub fn record_failed_attempt(&self, key: &str) {
        let now = self.clock.now();
        let mut rec = self
            .attempts
            .entry(key.to_string())
            .or_insert_with(|| AttemptRecord::new(now));

        if rec.block_lapsed(now) {
            *rec = AttemptRecord::new(now);
        } else if rec.window_expired(now, self.policy.window()) {
            rec.window_start = now;
            rec.failure_count = 0;
        }

        rec.failure_count += 1;

        if rec.failure_count >= self.policy.max_attempts {
            rec.blocked_until = Some(now + self.policy.block());
            tracing::warn!(
                key,
                failures = rec.failure_count,
                block_secs = self.policy.block_secs,
                "too many failed logins, key blocked"
            );
        }
    }

    /// Forget everything about `key`
    pub fn record_success(&self, key: &str) {
        self.attempts.remove(key);
    }

    /// Seconds left on an active block, 0 when not blocked
    pub fn seconds_until_unblocked(&self, key: &str) -> u64 {
        let now = self.clock.now();
        self.attempts
            .get(key)
            .and_then(|rec| rec.blocked_until)
            .filter(|until| now < *until)
            .map(|until| {
                let millis = (until - now).num_milliseconds().max(0) as u64;
                millis.div_ceil(1000)
            })
            .unwrap_or(0)
    }

    /// Failures counted in the current window
    pub fn failure_count(&self, key: &str) -> u32 {
        self.attempts.get(key).map(|rec| rec.failure_count).unwrap_or(0)
    }

    /// Evict stale records, returning how many were removed
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        self.attempts.retain(|_, rec| {
            let keep = !rec.is_evictable(now, &self.policy);
            if !keep {
                removed += 1;
            }
            keep
        });
        if removed > 0 {
            tracing::debug!(removed, remaining = self.attempts.len(), "login limiter cleanup");
        }
        removed
    }

    /// Keys currently tracked
    pub fn tracked_keys(&self) -> usize {
        self.attempts.len()
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new(RateLimitPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_common::ManualClock;

    const KEY: &str = "10.0.0.7";

    fn limiter() -> (LoginRateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let limiter = LoginRateLimiter::with_clock(RateLimitPolicy::default(), clock.clone());
        (limiter, clock)
    }

    #[test]
    fn test_unknown_key_is_allowed() {
        let (limiter, _) = limiter();
        assert!(limiter.is_allowed(KEY));
        assert_eq!(limiter.seconds_until_unblocked(KEY), 0);
    }

    #[test]
    fn test_five_failures_block_for_five_minutes() {
        let (limiter, clock) = limiter();
        for _ in 0..4 {
            limiter.record_failed_attempt(KEY);
            assert!(limiter.is_allowed(KEY));
        }
        limiter.record_failed_attempt(KEY);

        assert!(!limiter.is_allowed(KEY));
        assert_eq!(limiter.seconds_until_unblocked(KEY), 300);

        clock.advance(Duration::seconds(120));
        assert!(!limiter.is_allowed(KEY));
        assert_eq!(limiter.seconds_until_unblocked(KEY), 180);
    }

    #[test]
    fn test_block_elapses_with_fresh_counter() {
        let (limiter, clock) = limiter();
        for _ in 0..5 {
            limiter.record_failed_attempt(KEY);
        }
        clock.advance(Duration::seconds(300));

        assert!(limiter.is_allowed(KEY));
        assert_eq!(limiter.failure_count(KEY), 0);

        limiter.record_failed_attempt(KEY);
        assert_eq!(limiter.failure_count(KEY), 1);
        assert!(limiter.is_allowed(KEY));
    }

    #[test]
    fn test_success_clears_immediately() {
        let (limiter, _) = limiter();
        for _ in 0..5 {
            limiter.record_failed_attempt(KEY);
        }
        assert!(!limiter.is_allowed(KEY));

        limiter.record_success(KEY);
        assert!(limiter.is_allowed(KEY));
        assert_eq!(limiter.seconds_until_unblocked(KEY), 0);
        assert_eq!(limiter.tracked_keys(), 0);
    }

    #[test]
    fn test_window_expiry_resets_count() {
        let (limiter, clock) = limiter();
        for _ in 0..4 {
            limiter.record_failed_attempt(KEY);
        }
        clock.advance(Duration::seconds(61));
        limiter.record_failed_attempt(KEY);

        assert_eq!(limiter.failure_count(KEY), 1);
        assert!(limiter.is_allowed(KEY));
    }

    #[test]
    fn test_keys_are_independent() {
        let (limiter, _) = limiter();
        for _ in 0..5 {
            limiter.record_failed_attempt("a");
        }
        assert!(!limiter.is_allowed("a"));
        assert!(limiter.is_allowed("b"));
    }

    #[test]
    fn test_cleanup_evicts_stale_records() {
        let (limiter, clock) = limiter();
        limiter.record_failed_attempt("idle");
        for _ in 0..5 {
            limiter.record_failed_attempt("blocked");
        }

        clock.advance(Duration::seconds(121));
        assert_eq!(limiter.cleanup(), 1);
        assert_eq!(limiter.failure_count("blocked"), 5);

        clock.advance(Duration::seconds(240));
        assert_eq!(limiter.cleanup(), 1);
        assert_eq!(limiter.tracked_keys(), 0);
    }

    #[test]
    fn test_concurrent_failures_are_not_lost() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let policy = RateLimitPolicy { max_attempts: 10_000, ..Default::default() };
        let limiter = LoginRateLimiter::with_clock(policy, clock);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..250 {
                        limiter.record_failed_attempt(KEY);
                    }
                });
            }
        });

        assert_eq!(limiter.failure_count(KEY), 2_000);
    }
}
