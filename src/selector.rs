//! Startup backend selection.
//!
//! Each component is chosen exactly once. Distributed backends are probed
//! when configured; any failure logs a warning and binds the local
//! alternative for the rest of the process. There is no re-probing.

use tracing::{info, warn};

use crate::cache::{CacheBackend, CacheManager, KEY_NAMESPACE, RedisCache, SqliteCache};
use crate::config::Config;
use crate::generation::{GenerationBackend, MockClient, RemoteClient, credential_is_valid};
use crate::ratelimit::{RateLimiter, RedisRateLimiter};
use crate::telemetry;

/// Chooses concrete backends from a [`Config`]. Never fails.
pub struct BackendSelector<'a> {
    config: &'a Config,
}

impl<'a> BackendSelector<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Shared limiter when configured and reachable, otherwise in-process.
    pub async fn rate_limiter(&self) -> RateLimiter {
        let limits = &self.config.rate_limit;
        if limits.distributed {
            match RedisRateLimiter::connect(&self.config.redis, limits).await {
                Ok(limiter) => return RateLimiter::Distributed(limiter),
                Err(e) => fallback("rate_limiter", &e),
            }
        }
        info!(
            requests = limits.requests,
            window_secs = limits.window_secs,
            "using local rate limiter"
        );
        RateLimiter::local(limits)
    }

    /// Remote cache when configured and reachable, otherwise the SQLite
    /// file, then an in-memory SQLite store, then a disabled cache.
    pub async fn cache_backend(&self) -> CacheBackend {
        let cache = &self.config.cache;
        if cache.distributed {
            match RedisCache::connect(&self.config.redis, KEY_NAMESPACE).await {
                Ok(remote) => return CacheBackend::Remote(remote),
                Err(e) => fallback("cache", &e),
            }
        }
        match SqliteCache::open(&cache.path) {
            Ok(local) => return CacheBackend::Local(local),
            Err(e) => fallback("cache_file", &e),
        }
        match SqliteCache::in_memory() {
            Ok(local) => CacheBackend::Local(local),
            Err(e) => {
                fallback("cache_memory", &e);
                CacheBackend::Disabled
            }
        }
    }

    pub async fn cache_manager(&self) -> CacheManager {
        CacheManager::new(self.cache_backend().await, self.config.cache.ttl())
    }

    /// Remote model when a plausible credential is configured, otherwise
    /// the mock.
    pub fn generation_backend(&self) -> GenerationBackend {
        let generation = &self.config.generation;
        if credential_is_valid(generation.api_key.as_deref()) {
            match RemoteClient::new(generation) {
                Ok(client) if client.is_available() => {
                    info!(model = %client.model(), "using remote generation backend");
                    return GenerationBackend::Remote(client);
                }
                Ok(_) => warn!("remote generation client reports unavailable"),
                Err(e) => fallback("generation", &e),
            }
        }
        info!("using mock generation backend");
        GenerationBackend::Mock(MockClient::new())
    }
}

fn fallback(component: &'static str, error: &dyn std::fmt::Display) {
    warn!(component, error = %error, "backend unavailable, falling back to local");
    metrics::counter!(telemetry::BACKEND_FALLBACKS_TOTAL, "component" => component).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn defaults_select_local_backends() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.cache.path = dir.path().join("cache.db");
        let selector = BackendSelector::new(&config);

        assert_eq!(selector.rate_limiter().await.backend_name(), "local");
        assert_eq!(selector.cache_backend().await.backend_name(), "sqlite");
        assert_eq!(selector.generation_backend().backend_name(), "mock");
    }

    #[tokio::test]
    async fn unopenable_cache_file_falls_back_to_memory() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        // a directory cannot be opened as a database file
        config.cache.path = dir.path().to_path_buf();

        match BackendSelector::new(&config).cache_backend().await {
            CacheBackend::Local(cache) => assert_eq!(cache.location(), None),
            other => panic!("unexpected backend: {}", other.backend_name()),
        }
    }

    #[test]
    fn valid_credential_selects_remote() {
        let mut config = Config::default();
        config.generation.api_key = Some("fw_0123456789abcdef".to_string());
        let backend = BackendSelector::new(&config).generation_backend();
        assert_eq!(backend.backend_name(), "remote");
        assert!(backend.is_available());
    }

    #[test]
    fn short_credential_selects_mock() {
        let mut config = Config::default();
        config.generation.api_key = Some("short".to_string());
        let backend = BackendSelector::new(&config).generation_backend();
        assert_eq!(backend.backend_name(), "mock");
    }
}
