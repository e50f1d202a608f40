//! In-process rate limiter: one [`TokenBucket`] per client/endpoint key.
//!
//! State is not durable; a process restart resets every limit.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use super::{Decision, RateLimitStatus, TokenBucket, bucket_key};
use crate::config::RateLimitConfig;

/// Buckets untouched for this long are dropped by the sweep.
pub const IDLE_BUCKET_TTL: Duration = Duration::from_secs(3600);

/// Minimum time between two sweeps.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Keyed collection of token buckets.
///
/// Each bucket sits behind its own mutex so that checks for unrelated
/// clients never contend. First access for a key goes through the map's
/// entry API, which creates at most one bucket per key.
pub struct LocalRateLimiter {
    capacity: u32,
    refill_rate: f64,
    window: Duration,
    buckets: DashMap<String, Arc<Mutex<TokenBucket>>>,
    last_sweep: Mutex<Instant>,
}

impl LocalRateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            capacity: config.requests,
            refill_rate: config.refill_rate(),
            window: config.window(),
            buckets: DashMap::new(),
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    /// Check and consume `cost` tokens for `client_id` (+ `endpoint`).
    pub fn is_allowed(&self, client_id: &str, endpoint: Option<&str>, cost: u32) -> Decision {
        let now = Instant::now();
        self.sweep_idle(now);

        let bucket = self.bucket(bucket_key(client_id, endpoint), now);
        let mut bucket = bucket.lock();
        if bucket.try_consume_at(cost, now) {
            Decision::allowed()
        } else {
            Decision::denied(bucket.retry_after())
        }
    }

    /// Report the current state without consuming anything.
    pub fn status(&self, client_id: &str, endpoint: Option<&str>) -> RateLimitStatus {
        let now = Instant::now();
        let key = bucket_key(client_id, endpoint);
        let Some(bucket) = self.buckets.get(&key).map(|entry| Arc::clone(entry.value())) else {
            return RateLimitStatus {
                allowed: true,
                remaining: self.capacity,
                reset_after: self.window,
            };
        };

        let bucket = bucket.lock();
        let available = bucket.available_at(now);
        RateLimitStatus {
            allowed: available >= 1.0,
            remaining: available.floor() as u32,
            reset_after: (bucket.last_refill() + self.window).saturating_duration_since(now),
        }
    }

    /// Number of live buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    fn bucket(&self, key: String, now: Instant) -> Arc<Mutex<TokenBucket>> {
        // clone out of the map so the shard lock is released before the
        // bucket lock is taken
        let entry = self.buckets.entry(key).or_insert_with(|| {
            Arc::new(Mutex::new(TokenBucket::new_at(
                self.capacity,
                self.refill_rate,
                now,
            )))
        });
        Arc::clone(entry.value())
    }

    /// Drop buckets idle for more than [`IDLE_BUCKET_TTL`], at most once per
    /// [`SWEEP_INTERVAL`].
    fn sweep_idle(&self, now: Instant) {
        {
            let mut last_sweep = self.last_sweep.lock();
            if now.saturating_duration_since(*last_sweep) < SWEEP_INTERVAL {
                return;
            }
            *last_sweep = now;
        }

        let Some(cutoff) = now.checked_sub(IDLE_BUCKET_TTL) else {
            return;
        };
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| bucket.lock().last_refill() >= cutoff);
        debug!(
            removed = before.saturating_sub(self.buckets.len()),
            "cleaned up idle rate limit buckets"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(requests: u32, window_secs: u64) -> LocalRateLimiter {
        LocalRateLimiter::new(&RateLimitConfig::new(requests, window_secs))
    }

    #[tokio::test(start_paused = true)]
    async fn capacity_then_retry_hint() {
        let limiter = limiter(5, 10);
        for _ in 0..5 {
            assert_eq!(limiter.is_allowed("c1", Some("summarize"), 1), Decision::allowed());
        }
        let denied = limiter.is_allowed("c1", Some("summarize"), 1);
        assert!(!denied.allowed);
        assert!((denied.retry_after - 2.0).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn endpoints_have_separate_buckets() {
        let limiter = limiter(1, 60);
        assert!(limiter.is_allowed("c1", Some("summarize"), 1).allowed);
        assert!(limiter.is_allowed("c1", Some("context"), 1).allowed);
        assert!(limiter.is_allowed("c1", None, 1).allowed);
        assert!(!limiter.is_allowed("c1", Some("summarize"), 1).allowed);
        assert_eq!(limiter.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn refills_after_waiting() {
        let limiter = limiter(2, 2);
        assert!(limiter.is_allowed("c", None, 1).allowed);
        assert!(limiter.is_allowed("c", None, 1).allowed);
        assert!(!limiter.is_allowed("c", None, 1).allowed);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(limiter.is_allowed("c", None, 1).allowed);
        assert!(!limiter.is_allowed("c", None, 1).allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_buckets_are_swept() {
        let limiter = limiter(10, 60);
        limiter.is_allowed("idle", None, 1);
        assert_eq!(limiter.len(), 1);

        tokio::time::advance(IDLE_BUCKET_TTL + Duration::from_secs(1)).await;
        limiter.is_allowed("fresh", None, 1);

        assert_eq!(limiter.len(), 1);
        assert_eq!(limiter.status("idle", None).remaining, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_is_throttled() {
        let limiter = limiter(10, 60);
        limiter.is_allowed("a", None, 1);

        // sweep runs here, "a" is not yet idle long enough
        tokio::time::advance(Duration::from_secs(3500)).await;
        limiter.is_allowed("b", None, 1);
        assert_eq!(limiter.len(), 2);

        // "a" is now idle past the TTL, but the last sweep was 200s ago
        tokio::time::advance(Duration::from_secs(200)).await;
        limiter.is_allowed("b", None, 1);
        assert_eq!(limiter.len(), 2);

        tokio::time::advance(Duration::from_secs(100)).await;
        limiter.is_allowed("b", None, 1);
        assert_eq!(limiter.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn status_of_unknown_key_is_full() {
        let limiter = limiter(60, 300);
        let status = limiter.status("nobody", Some("replies"));
        assert!(status.allowed);
        assert_eq!(status.remaining, 60);
        assert_eq!(status.reset_after, Duration::from_secs(300));
    }

    #[tokio::test(start_paused = true)]
    async fn status_does_not_consume() {
        let limiter = limiter(3, 30);
        limiter.is_allowed("c", None, 1);
        let status = limiter.status("c", None);
        assert_eq!(status.remaining, 2);
        assert_eq!(limiter.status("c", None).remaining, 2);
    }
}
