use screenplay_core::error::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("job not found: {id}")]
    JobNotFound { id: String },
}

impl QueueError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueueError::Database(_) => ErrorKind::DependencyTransient,
            QueueError::Serialization(_) => ErrorKind::InternalInvariant,
            QueueError::JobNotFound { .. } => ErrorKind::NotFound,
        }
    }
}

pub type Result<T> = std::result::Result<T, QueueError>;
