//! Response caching.
//!
//! - [`CacheBackend`]: key/value store with TTL, one of:
//!   - [`SqliteCache`]: local persistent file, lazy expiry plus an explicit sweep.
//!   - [`RedisCache`]: shared store, native per-key expiry.
//!   - `Disabled`: always misses; used only when no local store can be opened.
//! - [`CacheManager`]: derives versioned keys from `(text, mode, persona)`
//!   and wraps results in a metadata envelope.
//!
//! Every backend operation is soft-failing: internal errors are logged at
//! `warn` and surface as a miss or a `false` return.

pub mod manager;
pub mod remote;
pub mod sqlite;

pub use manager::{CACHE_SCHEMA_VERSION, CacheManager, CachedEntry, KEY_NAMESPACE};
pub use remote::RedisCache;
pub use sqlite::SqliteCache;

use std::time::Duration;

use serde_json::Value;

use crate::telemetry;

/// Process-scoped cache store.
pub enum CacheBackend {
    Local(SqliteCache),
    Remote(RedisCache),
    Disabled,
}

impl CacheBackend {
    /// Look up a live entry. Emits cache hit/miss metrics.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let value = match self {
            Self::Local(cache) => cache.get(key),
            Self::Remote(cache) => cache.get(key).await,
            Self::Disabled => None,
        };
        let counter = if value.is_some() {
            telemetry::CACHE_HITS_TOTAL
        } else {
            telemetry::CACHE_MISSES_TOTAL
        };
        metrics::counter!(counter, "backend" => self.backend_name()).increment(1);
        value
    }

    pub async fn set(&self, key: &str, value: &Value, ttl: Duration) -> bool {
        match self {
            Self::Local(cache) => cache.set(key, value, ttl),
            Self::Remote(cache) => cache.set(key, value, ttl).await,
            Self::Disabled => false,
        }
    }

    pub async fn delete(&self, key: &str) -> bool {
        match self {
            Self::Local(cache) => cache.delete(key),
            Self::Remote(cache) => cache.delete(key).await,
            Self::Disabled => false,
        }
    }

    pub async fn clear(&self) -> bool {
        match self {
            Self::Local(cache) => cache.clear(),
            Self::Remote(cache) => cache.clear().await,
            Self::Disabled => false,
        }
    }

    /// Physically remove expired entries. Only the local store needs
    /// this; the others report `0`.
    pub async fn cleanup_expired(&self) -> usize {
        match self {
            Self::Local(cache) => cache.cleanup_expired(),
            Self::Remote(_) | Self::Disabled => 0,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Local(_) => "sqlite",
            Self::Remote(_) => "redis",
            Self::Disabled => "disabled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn disabled_backend_always_misses() {
        let backend = CacheBackend::Disabled;
        assert!(!backend.set("k", &json!(1), Duration::from_secs(60)).await);
        assert_eq!(backend.get("k").await, None);
        assert_eq!(backend.cleanup_expired().await, 0);
    }

    #[tokio::test]
    async fn local_backend_delegates() {
        let backend = CacheBackend::Local(SqliteCache::in_memory().unwrap());
        assert!(backend.set("k", &json!("v"), Duration::from_secs(60)).await);
        assert_eq!(backend.get("k").await, Some(json!("v")));
        assert!(backend.delete("k").await);
        assert_eq!(backend.get("k").await, None);
        assert_eq!(backend.backend_name(), "sqlite");
    }
}
