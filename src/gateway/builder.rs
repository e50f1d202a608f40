//! Builder for assembling a gateway from explicit backends

use std::time::Duration;

use super::Gateway;
use crate::cache::{CacheBackend, CacheManager, SqliteCache};
use crate::config::{CacheConfig, GenerationConfig, RateLimitConfig};
use crate::generation::{GenerationBackend, MockClient};
use crate::ratelimit::RateLimiter;
use crate::{PostPilotError, Result};

/// Builder for [`Gateway`].
///
/// Components left unset get local defaults: an in-process limiter with the
/// default limits, an in-memory SQLite cache and the mock generator.
pub struct GatewayBuilder {
    rate_limiter: Option<RateLimiter>,
    cache: Option<CacheManager>,
    generation: Option<GenerationBackend>,
    temperature: f32,
    max_tokens: u32,
}

impl GatewayBuilder {
    pub fn new() -> Self {
        let defaults = GenerationConfig::default();
        Self {
            rate_limiter: None,
            cache: None,
            generation: None,
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens,
        }
    }

    pub fn rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    pub fn cache(mut self, cache: CacheManager) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Use `backend` with the given default TTL.
    pub fn cache_backend(self, backend: CacheBackend, ttl: Duration) -> Self {
        self.cache(CacheManager::new(backend, ttl))
    }

    pub fn generation(mut self, backend: GenerationBackend) -> Self {
        self.generation = Some(backend);
        self
    }

    /// Sampling temperature passed to every generation call (0.0 to 2.0).
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Build the gateway.
    ///
    /// # Errors
    ///
    /// Returns [`PostPilotError::Configuration`] if the generation
    /// parameters are out of range. Fails with a store error if no cache
    /// was given and the in-memory default cannot be created.
    pub fn build(self) -> Result<Gateway> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(PostPilotError::Configuration(format!(
                "temperature must be within 0.0..=2.0, got {}",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(PostPilotError::Configuration(
                "max_tokens must be greater than zero".into(),
            ));
        }

        let cache = match self.cache {
            Some(cache) => cache,
            None => CacheManager::new(
                CacheBackend::Local(SqliteCache::in_memory()?),
                CacheConfig::default().ttl(),
            ),
        };

        Ok(Gateway {
            rate_limiter: self
                .rate_limiter
                .unwrap_or_else(|| RateLimiter::local(&RateLimitConfig::default())),
            cache,
            generation: self
                .generation
                .unwrap_or_else(|| GenerationBackend::Mock(MockClient::new())),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        })
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}
