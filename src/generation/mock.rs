//! Deterministic offline generation.
//!
//! Used for local development and whenever no remote credential is
//! configured. Never fails. Sleeps `0.1 + 0.2 * temperature` seconds so that
//! latency-sensitive callers see a realistic delay.

use std::time::Duration;

use tokio::time::Instant;

use crate::types::GenerationResult;

pub const MOCK_MODEL: &str = "mock-local";
pub const MOCK_PROVIDER: &str = "local";

const TWEET_MARKER: &str = "Tweet:";
const FALLBACK_TWEET: &str = "Sample tweet content";

#[derive(Debug, Clone, Copy, Default)]
pub struct MockClient;

impl MockClient {
    pub fn new() -> Self {
        Self
    }

    pub fn is_available(&self) -> bool {
        true
    }

    pub async fn generate(&self, prompt: &str, temperature: f32) -> GenerationResult {
        let start = Instant::now();
        tokio::time::sleep(Self::delay(temperature)).await;

        let text = canned_response(prompt);
        GenerationResult {
            tokens_used: text.split_whitespace().count() as u64,
            text,
            provider: MOCK_PROVIDER.to_string(),
            model: MOCK_MODEL.to_string(),
            processing_time: start.elapsed().as_secs_f64(),
            success: true,
        }
    }

    /// Artificial latency for `temperature`.
    pub fn delay(temperature: f32) -> Duration {
        Duration::from_secs_f64(0.1 + 0.2 * f64::from(temperature.max(0.0)))
    }
}

/// Pick the branch by keyword, checked in order: summarize, context, reply.
fn canned_response(prompt: &str) -> String {
    let tweet = extract_tweet(prompt);
    let lower = prompt.to_lowercase();

    if lower.contains("summarize") {
        format!(
            "Summary of the tweet: {}...\n\n\
             This tweet discusses important topics that are relevant to the audience.\n\n\
             The key points are clearly presented and easy to understand.",
            prefix(tweet, 100)
        )
    } else if lower.contains("context") {
        format!(
            "Context for the tweet: {}...\n\n\
             This provides important background information about the topic.\n\n\
             The context helps readers understand the broader implications.\n\n\
             Additional insights are provided to enhance understanding.",
            prefix(tweet, 100)
        )
    } else if lower.contains("reply") {
        format!(
            "1. Great point about {}...! I'd love to hear more about this.\n\
             2. This is really interesting - what are your thoughts on the implications?\n\
             3. Thanks for sharing this insight about {}...!",
            prefix(tweet, 50),
            prefix(tweet, 30)
        )
    } else {
        format!(
            "Response to: {}...\n\n\
             This is a generated response based on the input content.\n\n\
             The response addresses the key points mentioned in the tweet.",
            prefix(tweet, 100)
        )
    }
}

/// Rest of the line after the first `Tweet:` marker.
fn extract_tweet(prompt: &str) -> &str {
    match prompt.find(TWEET_MARKER) {
        Some(pos) => {
            let rest = &prompt[pos + TWEET_MARKER.len()..];
            rest.split('\n').next().unwrap_or_default().trim()
        }
        None => FALLBACK_TWEET,
    }
}

/// First `n` chars of `s`.
fn prefix(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
