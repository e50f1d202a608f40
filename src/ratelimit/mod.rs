//! Admission control.
//!
//! [`RateLimiter`] is a closed set of two implementations chosen once at
//! startup by the [`selector`](crate::selector):
//!
//! - [`LocalRateLimiter`]: in-process token buckets with lazy refill.
//! - [`RedisRateLimiter`]: shared sliding-window log, fails open.
//!
//! A denial is a normal outcome carrying a retry hint, not an error.

pub mod bucket;
pub mod distributed;
pub mod local;

pub use bucket::TokenBucket;
pub use distributed::RedisRateLimiter;
pub use local::LocalRateLimiter;

use std::time::Duration;

use tracing::debug;

use crate::config::RateLimitConfig;
use crate::telemetry;

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub allowed: bool,
    /// Seconds the client should wait before retrying; `0.0` when allowed.
    pub retry_after: f64,
}

impl Decision {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            retry_after: 0.0,
        }
    }

    pub fn denied(retry_after: f64) -> Self {
        Self {
            allowed: false,
            retry_after,
        }
    }

    /// Retry hint as a [`Duration`]. A limiter that never refills reports
    /// an infinite hint, which saturates to [`Duration::MAX`].
    pub fn retry_after_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.retry_after.max(0.0)).unwrap_or(Duration::MAX)
    }
}

/// Point-in-time view of a client's limit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitStatus {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_after: Duration,
}

/// Process-scoped rate limiter.
pub enum RateLimiter {
    Local(LocalRateLimiter),
    Distributed(RedisRateLimiter),
}

impl RateLimiter {
    /// In-process limiter, the fallback for every configuration.
    pub fn local(config: &RateLimitConfig) -> Self {
        Self::Local(LocalRateLimiter::new(config))
    }

    /// Check whether `client_id` may spend `cost` on `endpoint`.
    pub async fn is_allowed(&self, client_id: &str, endpoint: Option<&str>, cost: u32) -> Decision {
        let decision = match self {
            Self::Local(limiter) => limiter.is_allowed(client_id, endpoint, cost),
            Self::Distributed(limiter) => limiter.is_allowed(client_id, endpoint, cost).await,
        };

        let outcome = if decision.allowed { "allowed" } else { "denied" };
        metrics::counter!(
            telemetry::RATE_LIMIT_DECISIONS_TOTAL,
            "backend" => self.backend_name(),
            "outcome" => outcome
        )
        .increment(1);
        if !decision.allowed {
            debug!(
                client_id,
                endpoint = endpoint.unwrap_or("global"),
                retry_after = decision.retry_after,
                "request rate limited"
            );
        }
        decision
    }

    pub async fn status(&self, client_id: &str, endpoint: Option<&str>) -> RateLimitStatus {
        match self {
            Self::Local(limiter) => limiter.status(client_id, endpoint),
            Self::Distributed(limiter) => limiter.status(client_id, endpoint).await,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Local(_) => "local",
            Self::Distributed(_) => "redis",
        }
    }
}

/// Bucket key: `client` alone, or `client:endpoint`.
pub(crate) fn bucket_key(client_id: &str, endpoint: Option<&str>) -> String {
    match endpoint {
        Some(endpoint) if !endpoint.is_empty() => format!("{client_id}:{endpoint}"),
        _ => client_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_key_joins_endpoint() {
        assert_eq!(bucket_key("c1", Some("summarize")), "c1:summarize");
        assert_eq!(bucket_key("c1", None), "c1");
        assert_eq!(bucket_key("c1", Some("")), "c1");
    }

    #[test]
    fn negative_retry_hint_is_clamped() {
        assert_eq!(Decision::denied(-1.0).retry_after_duration(), Duration::ZERO);
    }

    #[test]
    fn infinite_retry_hint_saturates() {
        assert_eq!(Decision::denied(f64::INFINITY).retry_after_duration(), Duration::MAX);
        assert_eq!(Decision::denied(2.5).retry_after_duration(), Duration::from_millis(2500));
    }
}
