use screenplay_core::error::ErrorKind;
use thiserror::Error;

use crate::types::CasConflict;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("version conflict")]
    VersionConflict(Box<CasConflict>),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Database(_) => ErrorKind::DependencyTransient,
            StoreError::NotFound { .. } => ErrorKind::NotFound,
            StoreError::VersionConflict(_) => ErrorKind::VersionConflict,
            StoreError::Validation(_) => ErrorKind::Validation,
            StoreError::Invariant(_) => ErrorKind::InternalInvariant,
            StoreError::Serialization(_) => ErrorKind::Validation,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
