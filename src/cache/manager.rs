//! Versioned cache keys and the metadata envelope around cached results.
//!
//! # Invalidation
//!
//! [`CACHE_SCHEMA_VERSION`] is folded into every key. Bumping it when the
//! generation logic or prompt format changes makes all earlier entries
//! unreachable; they are left to expire on their own rather than deleted.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use super::CacheBackend;
use crate::store::epoch_secs;
use crate::types::Mode;

/// Current cache schema version. Bump on prompt or generation changes.
pub const CACHE_SCHEMA_VERSION: &str = "v2";

/// Prefix of every cache key.
pub const KEY_NAMESPACE: &str = "postpilot";

/// Hex chars of the raw-text digest kept in the envelope.
const TEXT_HASH_LEN: usize = 16;

/// A cached result with the metadata stored alongside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedEntry<T> {
    pub result: T,
    /// Epoch seconds at which the entry was written.
    pub cached_at: f64,
    pub mode: Mode,
    pub persona: String,
    /// Short digest of the raw text, for diagnostics only.
    pub text_hash: String,
}

/// Cache front-end used by the gateway. Owns exactly one backend.
pub struct CacheManager {
    backend: CacheBackend,
    default_ttl: Duration,
    version: String,
}

impl CacheManager {
    pub fn new(backend: CacheBackend, default_ttl: Duration) -> Self {
        Self {
            backend,
            default_ttl,
            version: CACHE_SCHEMA_VERSION.to_string(),
        }
    }

    /// Override the schema version folded into keys.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn backend(&self) -> &CacheBackend {
        &self.backend
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Deterministic key for `(text, mode, persona)`.
    ///
    /// The text is trimmed and lowercased first, so inputs that differ only
    /// in surrounding whitespace or case share an entry.
    pub fn generate_key(&self, text: &str, mode: Mode, persona: &str) -> String {
        let normalized = text.trim().to_lowercase();
        let digest = Sha256::digest(format!(
            "{normalized}:{}:{persona}:{}",
            mode.as_str(),
            self.version
        ));
        format!("{KEY_NAMESPACE}:{}", hex::encode(digest))
    }

    /// Fetch a cached result. Undecodable entries read as a miss.
    pub async fn get<T: DeserializeOwned>(
        &self,
        text: &str,
        mode: Mode,
        persona: &str,
    ) -> Option<CachedEntry<T>> {
        let key = self.generate_key(text, mode, persona);
        let value = self.backend.get(&key).await?;
        serde_json::from_value(value)
            .map_err(|e| warn!(key = %key, error = %e, "discarding undecodable cache entry"))
            .ok()
    }

    /// Store `result`. `ttl` of `None` uses the configured default.
    pub async fn set<T: Serialize>(
        &self,
        text: &str,
        mode: Mode,
        persona: &str,
        result: &T,
        ttl: Option<Duration>,
    ) -> bool {
        let key = self.generate_key(text, mode, persona);
        let entry = CachedEntry {
            result,
            cached_at: epoch_secs(),
            mode,
            persona: persona.to_string(),
            text_hash: text_hash(text),
        };
        let value = match serde_json::to_value(&entry) {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "failed to encode cache entry");
                return false;
            }
        };
        self.backend
            .set(&key, &value, ttl.unwrap_or(self.default_ttl))
            .await
    }

    pub async fn delete(&self, text: &str, mode: Mode, persona: &str) -> bool {
        let key = self.generate_key(text, mode, persona);
        self.backend.delete(&key).await
    }

    pub async fn clear(&self) -> bool {
        self.backend.clear().await
    }

    pub async fn cleanup_expired(&self) -> usize {
        self.backend.cleanup_expired().await
    }
}

/// First [`TEXT_HASH_LEN`] hex chars of SHA-256 over the raw text.
fn text_hash(text: &str) -> String {
    let mut hash = hex::encode(Sha256::digest(text.as_bytes()));
    hash.truncate(TEXT_HASH_LEN);
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> CacheManager {
        CacheManager::new(CacheBackend::Disabled, Duration::from_secs(60))
    }

    #[test]
    fn key_is_deterministic_and_namespaced() {
        let m = manager();
        let k1 = m.generate_key("Hello World", Mode::Summarize, "human");
        let k2 = m.generate_key("Hello World", Mode::Summarize, "human");
        assert_eq!(k1, k2);
        assert!(k1.starts_with("postpilot:"));
        assert_eq!(k1.len(), "postpilot:".len() + 64);
    }

    #[test]
    fn key_ignores_case_and_surrounding_whitespace() {
        let m = manager();
        assert_eq!(
            m.generate_key("  Hello World\n", Mode::Summarize, "human"),
            m.generate_key("hello world", Mode::Summarize, "human")
        );
    }

    #[test]
    fn key_matches_known_digest() {
        let m = manager();
        let expected = hex::encode(Sha256::digest("hello world:summarize:human:v2"));
        assert_eq!(
            m.generate_key("Hello World", Mode::Summarize, "human"),
            format!("postpilot:{expected}")
        );
    }

    #[test]
    fn key_differs_on_mode_and_persona() {
        let m = manager();
        let base = m.generate_key("text", Mode::Summarize, "human");
        assert_ne!(base, m.generate_key("text", Mode::Context, "human"));
        assert_ne!(base, m.generate_key("text", Mode::Summarize, "pirate"));
    }

    #[test]
    fn version_bump_changes_every_key() {
        let v2 = manager();
        let v3 = manager().with_version("v3");
        for (text, mode) in [("a", Mode::Summarize), ("b", Mode::Replies)] {
            assert_ne!(
                v2.generate_key(text, mode, "human"),
                v3.generate_key(text, mode, "human")
            );
        }
    }

    #[test]
    fn text_hash_is_short_and_case_sensitive() {
        assert_eq!(text_hash("Hello").len(), TEXT_HASH_LEN);
        assert_ne!(text_hash("Hello"), text_hash("hello"));
    }
}
