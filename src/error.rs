//! PostPilot error types

use std::time::Duration;

/// PostPilot error types
///
/// Only generation failures reach a caller of [`Gateway`](crate::Gateway).
/// Cache and rate-limit store errors are logged inside their backends and
/// degrade to a miss, a no-op or an allowed decision.
#[derive(Debug, thiserror::Error)]
pub enum PostPilotError {
    // Provider/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("empty response from model")]
    EmptyResponse,

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A shared store could not be reached when probed.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The remote generation client has no usable credential.
    #[error("generation backend not configured")]
    NotConfigured,

    // Store errors, recovered inside the backends
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl PostPilotError {
    /// Whether this error is a generation failure that the caller must see
    /// as a processing error.
    pub fn is_generation_failure(&self) -> bool {
        matches!(
            self,
            Self::Http(_)
                | Self::Api { .. }
                | Self::Timeout(_)
                | Self::EmptyResponse
                | Self::Json(_)
                | Self::NotConfigured
        )
    }
}

impl From<reqwest::Error> for PostPilotError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            PostPilotError::Api {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            PostPilotError::Http(err.to_string())
        }
    }
}

/// Result type alias for PostPilot operations
pub type Result<T> = std::result::Result<T, PostPilotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_failures_are_classified() {
        assert!(PostPilotError::Timeout(Duration::from_secs(30)).is_generation_failure());
        assert!(
            PostPilotError::Api {
                status: 500,
                message: "boom".into()
            }
            .is_generation_failure()
        );
        assert!(!PostPilotError::Configuration("bad".into()).is_generation_failure());
    }

    #[test]
    fn api_error_display() {
        let err = PostPilotError::Api {
            status: 401,
            message: "unauthorized".into(),
        };
        assert_eq!(err.to_string(), "API error (401): unauthorized");
    }
}
