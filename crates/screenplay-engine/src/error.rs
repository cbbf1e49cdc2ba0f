//! HTTP-facing error mapping (spec §7).
//!
//! Every downstream crate's error enum already exposes `.kind()` against
//! the shared `screenplay_core::error::ErrorKind` taxonomy; this module's
//! only job is turning that stable kind tag into the HTTP status code and
//! JSON body collaborators see, per spec §7's propagation policy: "all
//! other kinds propagate to the collaborator with a stable kind tag, an
//! optional entity identifier, and a human-readable message."

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use screenplay_core::error::ErrorKind;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Agent(#[from] screenplay_agent::AgentError),

    #[error(transparent)]
    Store(#[from] screenplay_store::StoreError),

    #[error(transparent)]
    Queue(#[from] screenplay_queue::QueueError),

    #[error(transparent)]
    Crdt(#[from] screenplay_crdt::CrdtError),

    #[error(transparent)]
    Conversation(#[from] screenplay_conversation::error::ConversationError),

    #[error("validation: {0}")]
    Validation(String),
}

impl EngineError {
    fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Agent(e) => e.kind(),
            EngineError::Store(e) => e.kind(),
            EngineError::Queue(e) => e.kind(),
            EngineError::Crdt(e) => e.kind(),
            EngineError::Conversation(e) => e.kind(),
            EngineError::Validation(_) => ErrorKind::Validation,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    kind: &'static str,
    message: String,
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = match kind {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::VersionConflict => StatusCode::CONFLICT,
            ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::DependencyTransient => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::DependencyFatal => StatusCode::BAD_GATEWAY,
            ErrorKind::InternalInvariant => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "internal invariant violated");
        }
        (status, Json(ErrorBody { kind: kind.code(), message: self.to_string() })).into_response()
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
