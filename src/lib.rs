//! PostPilot core - admission control, response caching and generation
//! backend selection for the PostPilot text API.
//!
//! The HTTP layer hands each request to a [`Gateway`], which:
//!
//! 1. asks the [`RateLimiter`] whether the client may proceed,
//! 2. looks the `(text, mode, persona)` triple up in the [`CacheManager`],
//! 3. on a miss, calls the [`GenerationBackend`] and caches the result.
//!
//! Backends are chosen once at startup by the [`BackendSelector`]. Shared
//! stores that cannot be reached, or a missing model credential, degrade to
//! local alternatives instead of failing.
//!
//! # Example
//!
//! ```rust,no_run
//! use postpilot::{Config, Gateway, Mode, Outcome, ProcessRequest};
//!
//! #[tokio::main]
//! async fn main() -> postpilot::Result<()> {
//!     let config = Config::load(None)?;
//!     let gateway = Gateway::from_config(&config).await?;
//!
//!     let request = ProcessRequest::new(
//!         "client-1",
//!         "Rates were held steady today.",
//!         Mode::Summarize,
//!         "Summarize this tweet.\nTweet: Rates were held steady today.",
//!     );
//!
//!     match gateway.process(&request).await? {
//!         Outcome::Denied { retry_after } => println!("retry in {retry_after:.1}s"),
//!         outcome => println!("{}", outcome.result().map_or("", |r| r.text.as_str())),
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod generation;
pub mod ratelimit;
pub mod selector;
mod store;
pub mod telemetry;
pub mod types;

// Re-export main types at crate root
pub use cache::{CacheBackend, CacheManager, CachedEntry};
pub use config::Config;
pub use error::{PostPilotError, Result};
pub use gateway::{Gateway, GatewayBuilder, Outcome, ProcessRequest};
pub use generation::GenerationBackend;
pub use ratelimit::{Decision, RateLimitStatus, RateLimiter, TokenBucket};
pub use selector::BackendSelector;
pub use types::{GenerationResult, Mode};

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
