use screenplay_core::error::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrdtError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("{parent_kind} not found: {parent_id}")]
    NotFound { parent_kind: String, parent_id: String },
    #[error("malformed update: {0}")]
    MalformedUpdate(String),
}

impl CrdtError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CrdtError::Database(_) => ErrorKind::DependencyTransient,
            CrdtError::Serialization(_) => ErrorKind::InternalInvariant,
            CrdtError::NotFound { .. } => ErrorKind::NotFound,
            CrdtError::MalformedUpdate(_) => ErrorKind::Validation,
        }
    }
}

pub type Result<T> = std::result::Result<T, CrdtError>;
