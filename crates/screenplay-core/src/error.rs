use thiserror::Error;

/// Coarse error taxonomy shared across every crate in the workspace (spec §7).
///
/// Each crate defines its own concrete error enum for what it can actually
/// raise, but every one of those enums exposes a `kind()` returning one of
/// these variants so collaborators outside the core can branch on a stable
/// tag without depending on crate-internal error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    VersionConflict,
    PermissionDenied,
    Validation,
    DependencyTransient,
    DependencyFatal,
    InternalInvariant,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::VersionConflict => "VERSION_CONFLICT",
            ErrorKind::PermissionDenied => "PERMISSION_DENIED",
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::DependencyTransient => "DEPENDENCY_TRANSIENT",
            ErrorKind::DependencyFatal => "DEPENDENCY_FATAL",
            ErrorKind::InternalInvariant => "INTERNAL_INVARIANT",
        }
    }
}

/// Errors raised directly by `screenplay-core` (config loading, hashing
/// preconditions). Most errors in the workspace originate in a downstream
/// crate and carry their own enum; this covers the small surface owned by
/// this crate.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("validation error: {0}")]
    Validation(String),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Config(_) => ErrorKind::DependencyFatal,
            CoreError::Validation(_) => ErrorKind::Validation,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
