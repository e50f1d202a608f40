//! Shared remote cache on redis.
//!
//! TTL is delegated to redis' per-key expiry. `clear` removes only keys in
//! this cache's namespace so that rate-limit windows living in the same
//! database survive.

use std::time::Duration;

use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::RedisConfig;
use crate::store;
use crate::Result;

/// Keys scanned per `SCAN` round trip in [`RedisCache::clear`].
const SCAN_BATCH: usize = 500;

pub struct RedisCache {
    conn: MultiplexedConnection,
    command_timeout: Duration,
    namespace: String,
}

impl RedisCache {
    /// Connect and probe. Fails if the store cannot be reached within the
    /// configured probe timeout.
    pub async fn connect(config: &RedisConfig, namespace: impl Into<String>) -> Result<Self> {
        let conn = store::connect(config).await?;
        info!(url = %config.url, "redis cache initialized");
        Ok(Self {
            conn,
            command_timeout: config.command_timeout(),
            namespace: namespace.into(),
        })
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        store::bounded(self.command_timeout, self.try_get(key))
            .await
            .unwrap_or_else(|e| {
                warn!(key, error = %e, "redis cache get error");
                None
            })
    }

    /// Store `value` for `ttl`. A zero TTL removes the key instead, since
    /// such an entry would already be expired.
    pub async fn set(&self, key: &str, value: &Value, ttl: Duration) -> bool {
        let result = if ttl.is_zero() {
            store::bounded(self.command_timeout, self.try_delete(key)).await
        } else {
            store::bounded(self.command_timeout, self.try_set(key, value, ttl)).await
        };
        result
            .map_err(|e| warn!(key, error = %e, "redis cache set error"))
            .is_ok()
    }

    pub async fn delete(&self, key: &str) -> bool {
        store::bounded(self.command_timeout, self.try_delete(key))
            .await
            .map_err(|e| warn!(key, error = %e, "redis cache delete error"))
            .is_ok()
    }

    /// Every round trip is bounded by the command timeout.
    pub async fn clear(&self) -> bool {
        self.try_clear()
            .await
            .map_err(|e| warn!(error = %e, "redis cache clear error"))
            .is_ok()
    }

    async fn try_get(&self, key: &str) -> Result<Option<Value>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn try_set(&self, key: &str, value: &Value, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let raw = serde_json::to_string(value)?;
        // PX keeps sub-second TTLs; at least 1ms so redis accepts it
        let millis = ttl.as_millis().clamp(1, u128::from(u64::MAX)) as u64;
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(raw)
            .arg("PX")
            .arg(millis)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn try_delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn try_clear(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}:*", self.namespace);
        let mut cursor: u64 = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = store::bounded(self.command_timeout, async {
                Ok(redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(&pattern)
                    .arg("COUNT")
                    .arg(SCAN_BATCH)
                    .query_async(&mut conn)
                    .await?)
            })
            .await?;
            if !keys.is_empty() {
                store::bounded::<()>(self.command_timeout, async { Ok(conn.del(keys).await?) })
                    .await?;
            }
            if next == 0 {
                return Ok(());
            }
            cursor = next;
        }
    }
}
