//! Local persistent cache backed by a single SQLite file.
//!
//! Rows are `(key, value, created_at, expires_at)` with timestamps in epoch
//! seconds. Expiry is applied at read time; physically removing expired rows
//! is left to [`SqliteCache::cleanup_expired`], which an external scheduler
//! calls.

use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use tracing::{info, warn};

use crate::Result;
use crate::store::epoch_secs;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS cache (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        created_at REAL NOT NULL,
        expires_at REAL NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_expires_at ON cache(expires_at);
";

/// SQLite cache. One connection, serialized behind a mutex.
pub struct SqliteCache {
    conn: Mutex<Connection>,
    location: Option<PathBuf>,
}

impl SqliteCache {
    /// Open (or create) the cache file at `path` and ensure the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        info!(db_path = %path.display(), "SQLite cache initialized");
        Ok(Self {
            conn: Mutex::new(conn),
            location: Some(path.to_path_buf()),
        })
    }

    /// Non-persistent cache, used when the file cannot be opened.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            location: None,
        })
    }

    /// Backing file, `None` for an in-memory cache.
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    /// Fetch a live entry. Errors are logged and read as a miss.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.try_get(key).unwrap_or_else(|e| {
            warn!(key, error = %e, "SQLite cache get error");
            None
        })
    }

    /// Insert or replace an entry expiring `ttl` from now.
    pub fn set(&self, key: &str, value: &Value, ttl: Duration) -> bool {
        self.try_set(key, value, ttl)
            .map_err(|e| warn!(key, error = %e, "SQLite cache set error"))
            .is_ok()
    }

    pub fn delete(&self, key: &str) -> bool {
        self.conn
            .lock()
            .execute("DELETE FROM cache WHERE key = ?1", params![key])
            .map_err(|e| warn!(key, error = %e, "SQLite cache delete error"))
            .is_ok()
    }

    pub fn clear(&self) -> bool {
        self.conn
            .lock()
            .execute("DELETE FROM cache", [])
            .map_err(|e| warn!(error = %e, "SQLite cache clear error"))
            .is_ok()
    }

    /// Delete every row whose `expires_at` has passed. Returns the number
    /// of rows removed, `0` on error.
    pub fn cleanup_expired(&self) -> usize {
        self.conn
            .lock()
            .execute(
                "DELETE FROM cache WHERE expires_at <= ?1",
                params![epoch_secs()],
            )
            .unwrap_or_else(|e| {
                warn!(error = %e, "SQLite cache cleanup error");
                0
            })
    }

    /// Rows physically present, expired or not.
    pub fn row_count(&self) -> usize {
        self.conn
            .lock()
            .query_row("SELECT COUNT(*) FROM cache", [], |row| row.get::<_, i64>(0))
            .map(|n| n as usize)
            .unwrap_or_else(|e| {
                warn!(error = %e, "SQLite cache count error");
                0
            })
    }

    fn try_get(&self, key: &str) -> Result<Option<Value>> {
        let raw: Option<String> = self
            .conn
            .lock()
            .query_row(
                "SELECT value FROM cache WHERE key = ?1 AND expires_at > ?2",
                params![key, epoch_secs()],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn try_set(&self, key: &str, value: &Value, ttl: Duration) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        let now = epoch_secs();
        self.conn.lock().execute(
            "INSERT OR REPLACE INTO cache (key, value, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![key, raw, now, now + ttl.as_secs_f64()],
        )?;
        Ok(())
    }
}
