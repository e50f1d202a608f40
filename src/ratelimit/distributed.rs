//! Distributed rate limiter: sliding-window log over a redis sorted set.
//!
//! Each check runs one `MULTI`/`EXEC` pipeline that trims entries older
//! than the window, counts what is left, records the current request and
//! refreshes the key expiry. A request is allowed when the count taken
//! before the insert is below the limit.
//!
//! Store errors fail open: the request is allowed with no retry hint.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use tracing::{info, warn};

use super::{Decision, RateLimitStatus};
use crate::config::{RateLimitConfig, RedisConfig};
use crate::store::{self, epoch_secs};
use crate::{Result, telemetry};

pub struct RedisRateLimiter {
    conn: MultiplexedConnection,
    command_timeout: Duration,
    requests: u32,
    window: Duration,
    // disambiguates members recorded within the same timestamp
    sequence: AtomicU64,
}

impl RedisRateLimiter {
    /// Connect and probe the store. Fails if it cannot be reached within
    /// the configured probe timeout.
    pub async fn connect(redis: &RedisConfig, limits: &RateLimitConfig) -> Result<Self> {
        let conn = store::connect(redis).await?;
        info!(url = %redis.url, "redis rate limiter initialized");
        Ok(Self {
            conn,
            command_timeout: redis.command_timeout(),
            requests: limits.requests,
            window: limits.window(),
            sequence: AtomicU64::new(0),
        })
    }

    /// Record a request and decide on it. Never fails: a store that errors
    /// or stalls past the command timeout lets the request through.
    ///
    /// The log counts requests, so `_cost` does not weigh the entry.
    pub async fn is_allowed(&self, client_id: &str, endpoint: Option<&str>, _cost: u32) -> Decision {
        let key = window_key(client_id, endpoint);
        match store::bounded(self.command_timeout, self.check(&key)).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!(key = %key, error = %e, "redis rate limiter error, allowing request");
                metrics::counter!(telemetry::RATE_LIMIT_FAIL_OPEN_TOTAL).increment(1);
                Decision::allowed()
            }
        }
    }

    /// Report the current window without recording a request.
    pub async fn status(&self, client_id: &str, endpoint: Option<&str>) -> RateLimitStatus {
        let key = window_key(client_id, endpoint);
        match store::bounded(self.command_timeout, self.window_state(&key)).await {
            Ok(status) => status,
            Err(e) => {
                warn!(key = %key, error = %e, "redis rate limiter status error");
                RateLimitStatus {
                    allowed: true,
                    remaining: self.requests,
                    reset_after: self.window,
                }
            }
        }
    }

    async fn check(&self, key: &str) -> Result<Decision> {
        let mut conn = self.conn.clone();
        let now = epoch_secs();
        let window_secs = self.window.as_secs_f64();
        let member = format!("{now:.6}-{}", self.sequence.fetch_add(1, Ordering::Relaxed));

        let (count,): (u64,) = redis::pipe()
            .atomic()
            .zrembyscore(key, 0, now - window_secs)
            .ignore()
            .zcard(key)
            .zadd(key, member, now)
            .ignore()
            .expire(key, self.window.as_secs() as i64)
            .ignore()
            .query_async(&mut conn)
            .await?;

        if count < u64::from(self.requests) {
            return Ok(Decision::allowed());
        }

        let oldest: Vec<(String, f64)> = conn.zrange_withscores(key, 0, 0).await?;
        let retry_after = match oldest.first() {
            Some((_, score)) => (score + window_secs - now).max(0.0),
            None => window_secs,
        };
        Ok(Decision::denied(retry_after))
    }

    async fn window_state(&self, key: &str) -> Result<RateLimitStatus> {
        let mut conn = self.conn.clone();
        let now = epoch_secs();
        let window_secs = self.window.as_secs_f64();

        let count: u64 = conn.zcount(key, now - window_secs, "+inf").await?;
        let oldest: Vec<(String, f64)> = conn.zrange_withscores(key, 0, 0).await?;
        let reset_after = oldest
            .first()
            .map(|(_, score)| (score + window_secs - now).max(0.0))
            .unwrap_or(window_secs);

        Ok(RateLimitStatus {
            allowed: count < u64::from(self.requests),
            remaining: u64::from(self.requests).saturating_sub(count) as u32,
            reset_after: Duration::from_secs_f64(reset_after),
        })
    }
}

/// Sorted-set key for a client/endpoint pair.
pub(crate) fn window_key(client_id: &str, endpoint: Option<&str>) -> String {
    let endpoint = match endpoint {
        Some(endpoint) if !endpoint.is_empty() => endpoint,
        _ => "global",
    };
    format!("rate_limit:{client_id}:{endpoint}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_key_defaults_to_global() {
        assert_eq!(window_key("c1", None), "rate_limit:c1:global");
        assert_eq!(window_key("c1", Some("summarize")), "rate_limit:c1:summarize");
        assert_eq!(window_key("c1", Some("")), "rate_limit:c1:global");
    }

    #[tokio::test]
    async fn connect_to_unreachable_store_fails() {
        let redis = RedisConfig {
            url: "redis://127.0.0.1:1".into(),
            probe_timeout_ms: 500,
            ..RedisConfig::default()
        };
        let result = RedisRateLimiter::connect(&redis, &RateLimitConfig::default()).await;
        assert!(result.is_err());
    }
}
