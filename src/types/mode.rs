//! Processing modes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::PostPilotError;

/// What the caller wants done with a piece of text.
///
/// The string form doubles as the rate-limit endpoint and is folded into
/// the cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Summarize,
    Context,
    Replies,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Summarize => "summarize",
            Mode::Context => "context",
            Mode::Replies => "replies",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = PostPilotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "summarize" => Ok(Mode::Summarize),
            "context" => Ok(Mode::Context),
            "replies" => Ok(Mode::Replies),
            other => Err(PostPilotError::Configuration(format!("unknown mode: {other}"))),
        }
    }
}
