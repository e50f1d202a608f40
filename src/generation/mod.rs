//! Text generation backends.
//!
//! [`GenerationBackend`] is either the hosted model ([`RemoteClient`]) or the
//! deterministic offline [`MockClient`]. Which one a process uses is decided
//! once by the [`selector`](crate::selector).

pub mod format;
pub mod mock;
pub mod remote;

pub use format::format_response;
pub use mock::MockClient;
pub use remote::{RemoteClient, credential_is_valid};

use tokio::time::Instant;

use crate::Result;
use crate::telemetry;
use crate::types::GenerationResult;

pub enum GenerationBackend {
    Remote(RemoteClient),
    Mock(MockClient),
}

impl GenerationBackend {
    /// Produce text for `prompt`.
    ///
    /// Remote failures (error status, transport error, timeout) are returned
    /// as-is; nothing is retried here. The mock never fails.
    pub async fn generate(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<GenerationResult> {
        let start = Instant::now();
        let result = match self {
            Self::Remote(client) => client.generate(prompt, temperature, max_tokens).await,
            Self::Mock(client) => Ok(client.generate(prompt, temperature).await),
        };
        self.record(start, result.is_ok());
        result
    }

    pub fn is_available(&self) -> bool {
        match self {
            Self::Remote(client) => client.is_available(),
            Self::Mock(client) => client.is_available(),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Remote(_) => "remote",
            Self::Mock(_) => "mock",
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Self::Remote(client) => client.model(),
            Self::Mock(_) => mock::MOCK_MODEL,
        }
    }

    fn record(&self, start: Instant, ok: bool) {
        let outcome = if ok { "ok" } else { "error" };
        metrics::counter!(telemetry::GENERATION_REQUESTS_TOTAL,
            "backend" => self.backend_name(),
            "outcome" => outcome,
        )
        .increment(1);
        metrics::histogram!(telemetry::GENERATION_DURATION_SECONDS,
            "backend" => self.backend_name(),
        )
        .record(start.elapsed().as_secs_f64());
    }
}
