//! Service-wide error taxonomy.

use thiserror::Error;

/// Result type used across the service layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Coarse error classification shared by every component.
///
/// Component errors (`StorageError`, `SessionError`, ...) convert into this so
/// the transport layers can pick a status code without knowing each component.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or missing input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// User, group or session absent.
    #[error("not found")]
    NotFound,

    /// Credentials did not match.
    ///
    /// Transports report this exactly like `NotFound` so callers cannot tell
    /// an unknown account from a wrong password.
    #[error("authentication failed")]
    AuthFailure,

    /// Backing storage unreachable or failing.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// A remote dependency could not be reached.
    #[error("connectivity failure: {0}")]
    ConnectivityFailure(String),

    /// Anything else (signing, hashing, serialization).
    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn connectivity(msg: impl Into<String>) -> Self {
        Self::ConnectivityFailure(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    /// Errors that a caller may reasonably retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::ConnectivityFailure(_))
    }
}
