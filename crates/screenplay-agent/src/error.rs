use screenplay_core::error::ErrorKind;

use crate::provider::ProviderError;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("llm provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("store error: {0}")]
    Store(#[from] screenplay_store::StoreError),

    #[error("crdt error: {0}")]
    Crdt(#[from] screenplay_crdt::CrdtError),

    #[error("conversation error: {0}")]
    Conversation(#[from] screenplay_conversation::error::ConversationError),

    #[error("queue error: {0}")]
    Queue(#[from] screenplay_queue::QueueError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("validation: {0}")]
    Validation(String),

    #[error("deadline exceeded after {0:?}")]
    Deadline(std::time::Duration),
}

impl AgentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgentError::Provider(e) => e.kind(),
            AgentError::Store(e) => e.kind(),
            AgentError::Crdt(e) => e.kind(),
            AgentError::Conversation(e) => e.kind(),
            AgentError::Queue(e) => e.kind(),
            AgentError::Serialization(_) => ErrorKind::DependencyFatal,
            AgentError::Validation(_) => ErrorKind::Validation,
            AgentError::Deadline(_) => ErrorKind::DependencyTransient,
        }
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
