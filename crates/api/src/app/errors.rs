use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use thiserror::Error;

use guildgate_rpc::RpcError;

/// Failures of the credentials login, each with a stable numeric code.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("malformed request body: {0}")]
    MalformedBody(String),

    #[error("exactly one of username or email is required")]
    AmbiguousLogin,

    #[error("password is required")]
    EmptyPassword,

    /// Unknown account and wrong password look the same to the caller.
    #[error("user not found")]
    InvalidCredentials,

    #[error("failed to load user")]
    LoadFailed,

    #[error("failed to verify password")]
    VerifyFailed,

    #[error("failed to create session")]
    SessionFailed,

    #[error("failed to load user groups")]
    GroupsFailed,
}

impl AuthError {
    pub fn code(&self) -> i32 {
        match self {
            AuthError::MalformedBody(_) => 12000,
            AuthError::AmbiguousLogin => 12001,
            AuthError::EmptyPassword => 12002,
            AuthError::InvalidCredentials => 12003,
            AuthError::LoadFailed => 12004,
            AuthError::VerifyFailed => 12005,
            AuthError::SessionFailed => 12006,
            AuthError::GroupsFailed => 12007,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MalformedBody(_) | AuthError::AmbiguousLogin | AuthError::EmptyPassword => {
                StatusCode::BAD_REQUEST
            }
            AuthError::InvalidCredentials => StatusCode::NOT_FOUND,
            AuthError::LoadFailed | AuthError::GroupsFailed => StatusCode::UNAUTHORIZED,
            AuthError::VerifyFailed | AuthError::SessionFailed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> axum::response::Response {
        (
            self.status(),
            axum::Json(json!({
                "code": self.code(),
                "error": self.to_string(),
            })),
        )
            .into_response()
    }
}

pub fn rpc_status(err: &RpcError) -> StatusCode {
    match err {
        RpcError::Unimplemented(_) => StatusCode::NOT_IMPLEMENTED,
        RpcError::UnknownMethod(_) | RpcError::NotFound(_) => StatusCode::NOT_FOUND,
        RpcError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        RpcError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        RpcError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Errors on the wire keep the tagged `{"kind", "message"}` shape.
pub fn rpc_error_to_response(err: RpcError) -> axum::response::Response {
    (rpc_status(&err), axum::Json(err)).into_response()
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
