//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. explicit path (e.g. the CLI `--config` flag)
//! 2. `~/.postpilot/config.toml` (user)
//! 3. `/etc/postpilot/config.toml` (system)
//! 4. built-in defaults
//!
//! Every field has a default. Environment variables are applied on top of
//! the file (see [`Config::apply_env`]); the generation credential is
//! usually supplied that way rather than written to disk.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{PostPilotError, Result};

/// Fixed timeout for remote generation calls.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default remote model identifier.
pub const DEFAULT_MODEL: &str =
    "accounts/sentientfoundation-serverless/models/dobby-mini-unhinged-plus-llama-3-1-8b";

/// Top-level configuration consumed by the backend selector.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

/// Admission control settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Requests allowed per window, also the bucket capacity (default: 60).
    #[serde(default = "default_requests")]
    pub requests: u32,
    /// Window length in seconds (default: 300).
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Use the shared sliding-window limiter (default: false).
    #[serde(default)]
    pub distributed: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests: default_requests(),
            window_secs: default_window_secs(),
            distributed: false,
        }
    }
}

impl RateLimitConfig {
    pub fn new(requests: u32, window_secs: u64) -> Self {
        Self {
            requests,
            window_secs,
            distributed: false,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Tokens per second for the in-process bucket.
    pub fn refill_rate(&self) -> f64 {
        f64::from(self.requests) / self.window_secs as f64
    }
}

fn default_requests() -> u32 {
    60
}

fn default_window_secs() -> u64 {
    300
}

/// Response cache settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Default time-to-live in seconds (default: 86400).
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Use the shared remote cache (default: false).
    #[serde(default)]
    pub distributed: bool,
    /// SQLite file for the local cache (default: `postpilot.db`).
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            distributed: false,
            path: default_cache_path(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

fn default_ttl_secs() -> u64 {
    86_400
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("postpilot.db")
}

/// Shared store connection settings, used by both distributed backends.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Upper bound on the one-time startup probe (default: 2000ms).
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Upper bound on each command after startup (default: 1000ms). A store
    /// that stops answering is treated like one that errors.
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            probe_timeout_ms: default_probe_timeout_ms(),
            command_timeout_ms: default_command_timeout_ms(),
        }
    }
}

impl RedisConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_probe_timeout_ms() -> u64 {
    2_000
}

fn default_command_timeout_ms() -> u64 {
    1_000
}

/// Remote generation settings.
#[derive(Clone, Deserialize)]
pub struct GenerationConfig {
    /// Provider credential. Usually supplied via `FIREWORKS_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Sampling temperature, 0.0 to 2.0 (default: 0.7).
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            base_url: default_base_url(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

// Keeps the credential out of debug logs.
impl std::fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_base_url() -> String {
    "https://api.fireworks.ai/inference/v1".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    500
}

/// Environment variables honoured by [`Config::apply_env`].
const ENV_OVERRIDES: &[&str] = &[
    "POSTPILOT_RATE_LIMIT_REQUESTS",
    "POSTPILOT_RATE_LIMIT_WINDOW_SECS",
    "POSTPILOT_CACHE_TTL_SECS",
    "POSTPILOT_USE_REDIS",
    "POSTPILOT_REDIS_URL",
    "POSTPILOT_CACHE_PATH",
    "POSTPILOT_MODEL",
    "FIREWORKS_API_KEY",
];

impl Config {
    /// Load configuration from the standard locations, then apply
    /// environment overrides and validate.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a single TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PostPilotError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            PostPilotError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    /// Resolve the config file path. `Ok(None)` means "use defaults".
    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(PostPilotError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".postpilot").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        let system_config = PathBuf::from("/etc/postpilot/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    /// Apply overrides from a variable lookup (normally `std::env::var`).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        for name in ENV_OVERRIDES {
            let Some(value) = lookup(name) else {
                continue;
            };
            match *name {
                "POSTPILOT_RATE_LIMIT_REQUESTS" => {
                    self.rate_limit.requests = parse_env(name, &value)?
                }
                "POSTPILOT_RATE_LIMIT_WINDOW_SECS" => {
                    self.rate_limit.window_secs = parse_env(name, &value)?
                }
                "POSTPILOT_CACHE_TTL_SECS" => self.cache.ttl_secs = parse_env(name, &value)?,
                "POSTPILOT_USE_REDIS" => {
                    let enabled = parse_bool(name, &value)?;
                    self.cache.distributed = enabled;
                    self.rate_limit.distributed = enabled;
                }
                "POSTPILOT_REDIS_URL" => self.redis.url = value,
                "POSTPILOT_CACHE_PATH" => self.cache.path = PathBuf::from(value),
                "POSTPILOT_MODEL" => self.generation.model = value,
                "FIREWORKS_API_KEY" => {
                    self.generation.api_key = Some(value).filter(|k| !k.is_empty())
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Reject values the components cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit.requests == 0 {
            return Err(PostPilotError::Configuration(
                "rate_limit.requests must be greater than zero".into(),
            ));
        }
        if self.rate_limit.window_secs == 0 {
            return Err(PostPilotError::Configuration(
                "rate_limit.window_secs must be greater than zero".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(PostPilotError::Configuration(format!(
                "generation.temperature must be within 0.0..=2.0, got {}",
                self.generation.temperature
            )));
        }
        if self.generation.max_tokens == 0 {
            return Err(PostPilotError::Configuration(
                "generation.max_tokens must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        PostPilotError::Configuration(format!("Invalid value for {name}: {value:?}"))
    })
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(PostPilotError::Configuration(format!(
            "Invalid value for {name}: {value:?}"
        ))),
    }
}
