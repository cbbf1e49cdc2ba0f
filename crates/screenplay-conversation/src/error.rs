use screenplay_core::error::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("conversation not found: {key}")]
    NotFound { key: String },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("invalid conversation key: {0}")]
    InvalidKey(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ConversationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConversationError::NotFound { .. } => ErrorKind::NotFound,
            ConversationError::Database(_) => ErrorKind::DependencyTransient,
            ConversationError::InvalidKey(_) => ErrorKind::Validation,
            ConversationError::Serialization(_) => ErrorKind::InternalInvariant,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConversationError>;
