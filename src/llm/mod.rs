//! LLM backend abstraction and the OpenAI-compatible client.
//!
//! The server holds a `dyn ChatBackend` so tests can inject a mock and the
//! upstream provider can be swapped without touching the handlers.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::AppConfig;
use crate::prompt::ConversationTurn;

/// Upstream failure taxonomy. Each variant maps to a distinct HTTP status in
/// `crate::error::ApiError`.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("OPENAI_API_KEY environment variable is required")]
    MissingApiKey,

    #[error("Invalid API key")]
    Auth,

    #[error("API rate limit exceeded. Please try again later.")]
    RateLimited,

    #[error("Upstream service error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("Model response contained no choices")]
    EmptyResponse,

    #[error("Failed to reach the model service: {0}")]
    Transport(String),
}

/// A chat completion backend. One blocking call per request, no retries:
/// failures surface to the caller as error responses.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Run one completion over an ordered message list.
    async fn complete(&self, messages: &[ConversationTurn]) -> Result<String, LlmError>;

    /// Lightweight connectivity probe for the status endpoint.
    async fn probe(&self) -> Result<(), LlmError>;

    /// Model identifier for status reporting.
    fn model(&self) -> &str;
}

/// OpenAI-compatible chat completions client.
pub struct OpenAiBackend {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ConversationTurn],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiBackend {
    pub fn new(config: &AppConfig) -> Result<Self, LlmError> {
        let api_key = config
            .openai_api_key
            .clone()
            .ok_or(LlmError::MissingApiKey)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.openai_timeout))
            .build()
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url: config.chat_completions_url(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_output_tokens,
            temperature: config.temperature,
        })
    }

    async fn request(
        &self,
        messages: &[ConversationTurn],
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let body = CompletionRequest {
            model: &self.model,
            messages,
            max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return Err(LlmError::Auth),
            StatusCode::TOO_MANY_REQUESTS => return Err(LlmError::RateLimited),
            s if !s.is_success() => {
                let message = response.text().await.unwrap_or_default();
                return Err(LlmError::Upstream {
                    status: s.as_u16(),
                    message,
                });
            }
            _ => {}
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(LlmError::EmptyResponse)
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    async fn complete(&self, messages: &[ConversationTurn]) -> Result<String, LlmError> {
        debug!(model = %self.model, turns = messages.len(), "running chat completion");
        self.request(messages, self.max_tokens).await
    }

    async fn probe(&self) -> Result<(), LlmError> {
        let ping = [ConversationTurn::user("Test connection")];
        self.request(&ping, 10).await.map(|_| ())
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_key(key: Option<&str>) -> AppConfig {
        let mut config = AppConfig::from_env();
        config.openai_api_key = key.map(String::from);
        config.openai_base_url = "https://api.openai.com".into();
        config.model = "gpt-4o-mini".into();
        config
    }

    #[test]
    fn backend_requires_api_key() {
        let err = OpenAiBackend::new(&config_with_key(None)).err().unwrap();
        assert!(matches!(err, LlmError::MissingApiKey));
    }

    #[test]
    fn backend_targets_chat_completions_endpoint() {
        let backend = OpenAiBackend::new(&config_with_key(Some("sk-test"))).unwrap();
        assert_eq!(backend.url, "https://api.openai.com/v1/chat/completions");
        assert_eq!(backend.model(), "gpt-4o-mini");
    }

    #[tokio::test]
    async fn unreachable_host_maps_to_transport_error() {
        let mut config = config_with_key(Some("sk-test"));
        config.openai_base_url = "http://127.0.0.1:1".into();
        config.openai_timeout = 1;
        let backend = OpenAiBackend::new(&config).unwrap();

        let err = backend
            .complete(&[ConversationTurn::user("hi")])
            .await
            .err()
            .unwrap();
        assert!(matches!(err, LlmError::Transport(_)));
    }
}
