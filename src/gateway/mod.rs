//! Request gateway.
//!
//! [`Gateway`] runs one request through the three stages in order:
//!
//! 1. admission: the rate limiter, keyed by client and mode
//! 2. lookup: the response cache, keyed by text, mode and persona
//! 3. generation, followed by a write-back of successful results
//!
//! A denial or a cache hit ends the request early. Only generation errors
//! are returned as `Err`.

mod builder;

pub use builder::GatewayBuilder;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::Result;
use crate::cache::{CacheManager, CachedEntry};
use crate::config::Config;
use crate::generation::GenerationBackend;
use crate::ratelimit::RateLimiter;
use crate::selector::BackendSelector;
use crate::types::{GenerationResult, Mode};

/// Persona used when the caller does not pick one.
pub const DEFAULT_PERSONA: &str = "human";

/// One unit of work handed in by the HTTP layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRequest {
    pub client_id: String,
    pub text: String,
    pub mode: Mode,
    pub persona: String,
    /// Carried for the caller's prompt builder; not part of the cache key.
    #[serde(default)]
    pub style: Option<String>,
    /// Fully rendered prompt sent to the model on a cache miss.
    pub prompt: String,
}

impl ProcessRequest {
    pub fn new(
        client_id: impl Into<String>,
        text: impl Into<String>,
        mode: Mode,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            text: text.into(),
            mode,
            persona: DEFAULT_PERSONA.to_string(),
            style: None,
            prompt: prompt.into(),
        }
    }

    pub fn persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    pub fn style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }
}

/// How a request was answered.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Rejected by admission control; retry after this many seconds.
    Denied { retry_after: f64 },
    Cached(CachedEntry<GenerationResult>),
    Generated(GenerationResult),
}

impl Outcome {
    /// The result, if the request was answered.
    pub fn result(&self) -> Option<&GenerationResult> {
        match self {
            Outcome::Denied { .. } => None,
            Outcome::Cached(entry) => Some(&entry.result),
            Outcome::Generated(result) => Some(result),
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, Outcome::Cached(_))
    }
}

/// Process-scoped owner of the selected backends.
pub struct Gateway {
    rate_limiter: RateLimiter,
    cache: CacheManager,
    generation: GenerationBackend,
    temperature: f32,
    max_tokens: u32,
}

impl Gateway {
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    /// Select every backend from `config` and assemble a gateway.
    ///
    /// Unreachable distributed stores or a missing credential never fail
    /// here; the local alternatives are bound instead. An invalid `config`
    /// (zero request limit or window, parameters out of range) is rejected
    /// with [`PostPilotError::Configuration`](crate::PostPilotError).
    pub async fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let selector = BackendSelector::new(config);
        GatewayBuilder::new()
            .rate_limiter(selector.rate_limiter().await)
            .cache(selector.cache_manager().await)
            .generation(selector.generation_backend())
            .temperature(config.generation.temperature)
            .max_tokens(config.generation.max_tokens)
            .build()
    }

    #[instrument(skip(self, request), fields(client_id = %request.client_id, mode = %request.mode))]
    pub async fn process(&self, request: &ProcessRequest) -> Result<Outcome> {
        let decision = self
            .rate_limiter
            .is_allowed(&request.client_id, Some(request.mode.as_str()), 1)
            .await;
        if !decision.allowed {
            return Ok(Outcome::Denied {
                retry_after: decision.retry_after,
            });
        }

        if let Some(entry) = self
            .cache
            .get::<GenerationResult>(&request.text, request.mode, &request.persona)
            .await
        {
            debug!("serving cached result");
            return Ok(Outcome::Cached(entry));
        }

        let result = self
            .generation
            .generate(&request.prompt, self.temperature, self.max_tokens)
            .await?;
        if result.success {
            self.cache
                .set(&request.text, request.mode, &request.persona, &result, None)
                .await;
        }
        Ok(Outcome::Generated(result))
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    pub fn generation(&self) -> &GenerationBackend {
        &self.generation
    }
}
