//! Completion providers behind `POST /chats/{id}/message`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use aviary_core::config::AssistantConfig;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("completion request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("completion provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("completion contained no text")]
    EmptyCompletion,

    #[error("missing API key: set {0}")]
    MissingApiKey(String),
}

/// Turns a user message into the assistant's reply.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Short provider name for logs and `/health`.
    fn name(&self) -> &str;

    async fn complete(&self, message: &str) -> Result<String, LlmError>;
}

// =============================================================================
// OpenAI-compatible chat completions
// =============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<RequestMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    system_prompt: Option<String>,
}

impl OpenAiProvider {
    pub fn new(api_base: &str, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/v1/chat/completions", api_base.trim_end_matches('/')),
            api_key: api_key.into(),
            model: model.into(),
            system_prompt: None,
        }
    }

    /// Build from config, reading the key from `config.api_key_env`.
    pub fn from_config(config: &AssistantConfig) -> Result<Self, LlmError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| LlmError::MissingApiKey(config.api_key_env.clone()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        let mut provider = Self::new(&config.api_base, api_key, config.model.clone());
        provider.client = client;
        provider.system_prompt = config.system_prompt.clone();
        Ok(provider)
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request<'a>(&'a self, message: &'a str) -> ChatCompletionRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(prompt) = &self.system_prompt {
            messages.push(RequestMessage {
                role: "system",
                content: prompt,
            });
        }
        messages.push(RequestMessage {
            role: "user",
            content: message,
        });
        ChatCompletionRequest {
            model: &self.model,
            messages,
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    #[instrument(level = "debug", skip_all, fields(model = %self.model))]
    async fn complete(&self, message: &str) -> Result<String, LlmError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request(message))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Completion request rejected");
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = response.json().await?;
        let text = extract_text(parsed)?;
        debug!(chars = text.len(), "Completion received");
        Ok(text)
    }
}

fn extract_text(response: ChatCompletionResponse) -> Result<String, LlmError> {
    response
        .choices
        .into_iter()
        .find_map(|choice| choice.message.content)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or(LlmError::EmptyCompletion)
}

// =============================================================================
// Canned
// =============================================================================

/// Offline provider that answers every message with a fixed reply.
#[derive(Clone, Debug)]
pub struct CannedProvider {
    reply: String,
}

impl CannedProvider {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

impl Default for CannedProvider {
    fn default() -> Self {
        Self::new("I can't reach the bird expert right now, but keep watching the feeder!")
    }
}

#[async_trait]
impl CompletionProvider for CannedProvider {
    fn name(&self) -> &str {
        "canned"
    }

    async fn complete(&self, _message: &str) -> Result<String, LlmError> {
        Ok(self.reply.clone())
    }
}
