//! Remote generation over an OpenAI-compatible chat completions API.
//!
//! One request per call, bounded by a hard timeout, never retried. Replies
//! are normalized with [`format_response`](super::format::format_response).

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{instrument, warn};

use super::format::format_response;
use crate::config::{GenerationConfig, REQUEST_TIMEOUT};
use crate::types::GenerationResult;
use crate::{PostPilotError, Result};

/// Provider id reported in results.
pub const PROVIDER_ID: &str = "dobby-fireworks";

const SYSTEM_PROMPT: &str = "You are Dobby, a helpful AI assistant powered by Fireworks. \
                             Provide concise, accurate, and helpful responses.";

/// Shortest credential accepted as plausibly valid.
const MIN_CREDENTIAL_LEN: usize = 11;

/// Whether `key` looks like a usable credential. A length check only.
pub fn credential_is_valid(key: Option<&str>) -> bool {
    key.is_some_and(|k| k.len() >= MIN_CREDENTIAL_LEN)
}

/// Client for the hosted model.
#[derive(Clone)]
pub struct RemoteClient {
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
    http: Client,
}

impl RemoteClient {
    /// Build a client from configuration. Fails with
    /// [`PostPilotError::NotConfigured`] when no credential is set.
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or(PostPilotError::NotConfigured)?;
        Self::build(api_key, config.model.clone(), config.base_url.clone(), REQUEST_TIMEOUT)
    }

    /// Point the client at another endpoint (for testing with wiremock).
    pub fn with_base_url(self, base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..self
        }
    }

    /// Override the request timeout. Rebuilds the HTTP client.
    pub fn with_timeout(self, timeout: Duration) -> Result<Self> {
        Self::build(self.api_key, self.model, self.base_url, timeout)
    }

    fn build(api_key: String, model: String, base_url: String, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PostPilotError::Http(e.to_string()))?;
        Ok(Self {
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            http,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Configuration check only; no request is made.
    pub fn is_available(&self) -> bool {
        credential_is_valid(Some(self.api_key.as_str()))
    }

    #[instrument(skip(self, prompt), fields(model = %self.model))]
    pub async fn generate(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<GenerationResult> {
        if !self.is_available() {
            return Err(PostPilotError::NotConfigured);
        }

        let start = Instant::now();
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature,
            max_tokens,
            stream: false,
            top_p: 0.9,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "generation API returned an error");
            return Err(PostPilotError::Api {
                status: status.as_u16(),
                message: detail,
            });
        }

        let completion: ChatResponse = response
            .json()
            .await
            .map_err(|e| self.map_transport_error(e))?;
        let raw = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(PostPilotError::EmptyResponse)?;

        Ok(GenerationResult {
            text: format_response(&raw),
            provider: PROVIDER_ID.to_string(),
            model: self.model.clone(),
            processing_time: start.elapsed().as_secs_f64(),
            tokens_used: completion.usage.map_or(0, |u| u.total_tokens),
            success: true,
        })
    }

    fn map_transport_error(&self, err: reqwest::Error) -> PostPilotError {
        if err.is_timeout() {
            warn!(timeout = ?self.timeout, "generation request timed out");
            PostPilotError::Timeout(self.timeout)
        } else {
            warn!(error = %err, "generation request failed");
            err.into()
        }
    }
}

impl std::fmt::Debug for RemoteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteClient")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
    top_p: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(key: Option<&str>) -> GenerationConfig {
        GenerationConfig {
            api_key: key.map(str::to_string),
            ..GenerationConfig::default()
        }
    }

    #[test]
    fn credential_needs_more_than_ten_chars() {
        assert!(!credential_is_valid(None));
        assert!(!credential_is_valid(Some("")));
        assert!(!credential_is_valid(Some("0123456789")));
        assert!(credential_is_valid(Some("0123456789a")));
    }

    #[test]
    fn new_without_key_is_not_configured() {
        assert!(matches!(
            RemoteClient::new(&config(None)),
            Err(PostPilotError::NotConfigured)
        ));
    }

    #[test]
    fn short_key_builds_but_is_unavailable() {
        let client = RemoteClient::new(&config(Some("short"))).unwrap();
        assert!(!client.is_available());
    }

    #[test]
    fn debug_hides_the_key() {
        let client = RemoteClient::new(&config(Some("fw_secret_key_value"))).unwrap();
        assert!(!format!("{client:?}").contains("fw_secret"));
    }

    #[tokio::test]
    async fn generate_refuses_without_valid_key() {
        let client = RemoteClient::new(&config(Some("short"))).unwrap();
        let err = client.generate("hi", 0.7, 10).await.unwrap_err();
        assert!(matches!(err, PostPilotError::NotConfigured));
    }
}
