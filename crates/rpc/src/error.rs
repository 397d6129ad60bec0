use serde::{Deserialize, Serialize};
use thiserror::Error;

use guildgate_core::DomainError;

use crate::Method;

/// Error returned by a user service operation, carried on the wire as
/// `{"kind": ..., "message": ...}`.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum RpcError {
    #[error("method {0} not implemented")]
    Unimplemented(Method),

    #[error("unknown method '{0}'")]
    UnknownMethod(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl From<DomainError> for RpcError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => RpcError::InvalidArgument(msg),
            DomainError::NotFound | DomainError::AuthFailure => RpcError::NotFound(err.to_string()),
            DomainError::Unavailable(msg) | DomainError::ConnectivityFailure(msg) => RpcError::Unavailable(msg),
            DomainError::Internal(msg) => RpcError::Internal(msg),
        }
    }
}

impl From<RpcError> for DomainError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::InvalidArgument(msg) => DomainError::Validation(msg),
            RpcError::NotFound(_) => DomainError::NotFound,
            RpcError::Unavailable(msg) => DomainError::Unavailable(msg),
            other => DomainError::Internal(other.to_string()),
        }
    }
}
