use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use screenplay_core::error::ErrorKind;

use crate::stream::StreamEvent;

/// A single message in the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Tool definition sent to the LLM API (spec §4.8 tool loop).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// A tool call extracted from the LLM response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// Request to an LLM provider (spec §6 "LLM API": `{model, messages,
/// max_tokens, tools?, stream?}`).
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub stream: bool,
    pub tools: Vec<ToolDefinition>,
    /// Raw JSON messages for the tool loop (overrides `messages` when set)
    /// so the loop can build tool_use/tool_result content blocks that don't
    /// fit the plain-string `Message` shape.
    pub raw_messages: Option<Vec<serde_json::Value>>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, system: impl Into<String>, messages: Vec<Message>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            system: system.into(),
            messages,
            max_tokens,
            stream: false,
            tools: Vec::new(),
            raw_messages: None,
        }
    }
}

/// Usage as reported by one LLM call (spec §3 `TokenUsage`, §4.6).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub cache_creation_input_tokens: u32,
    pub cache_read_input_tokens: u32,
    pub output_tokens: u32,
}

/// Response from an LLM provider (non-streaming).
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    pub usage: Usage,
    pub stop_reason: String,
    pub tool_calls: Vec<ToolCall>,
}

/// Common interface an LLM provider implements (spec §4.6 "complete" /
/// "stream-complete"; `embed` lives on `EmbeddingProvider` since not every
/// chat provider also serves embeddings).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError>;

    /// Stream response events through a channel. Default falls back to
    /// non-streaming `send`, emitting one `TextDelta` then `Done`.
    async fn send_stream(&self, req: &ChatRequest, tx: mpsc::Sender<StreamEvent>) -> Result<(), ProviderError> {
        let resp = self.send(req).await?;
        let _ = tx.send(StreamEvent::TextDelta { text: resp.content }).await;
        let _ = tx
            .send(StreamEvent::Done {
                model: resp.model,
                usage: resp.usage,
                stop_reason: resp.stop_reason,
            })
            .await;
        Ok(())
    }
}

/// Batch text-embedding interface (spec §6 "Embedding API").
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, model: &str, inputs: &[String]) -> Result<(Vec<Vec<f32>>, Usage), ProviderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl ProviderError {
    /// Spec §4.6: rate-limited and transient-unavailable errors are
    /// retryable up to 3x with exponential backoff; auth and malformed
    /// requests are not.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited { .. } | ProviderError::Unavailable(_) | ProviderError::Http(_)
        )
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::RateLimited { .. } | ProviderError::Unavailable(_) | ProviderError::Http(_) => {
                ErrorKind::DependencyTransient
            }
            ProviderError::Auth(_) | ProviderError::Api { .. } => ErrorKind::DependencyFatal,
            ProviderError::Parse(_) => ErrorKind::DependencyFatal,
            ProviderError::Cancelled => ErrorKind::InternalInvariant,
        }
    }
}
