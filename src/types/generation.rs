//! Generation result type.

use serde::{Deserialize, Serialize};

/// Output of one generation call.
///
/// Produced once per call and handed to the caller; the gateway also
/// stores successful results in the response cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub text: String,
    /// Provider identifier (e.g. "dobby-fireworks", "local").
    pub provider: String,
    pub model: String,
    /// Wall time spent producing the text, in seconds.
    pub processing_time: f64,
    pub tokens_used: u64,
    pub success: bool,
}
