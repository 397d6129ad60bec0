use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::Value;

use guildgate_rpc::{dispatch, Method, RpcError};

use crate::app::errors;
use crate::app::services::GuildgateService;

/// `POST /rpc/:method`: decode, dispatch and encode one user service call.
pub async fn call(
    Extension(service): Extension<Arc<GuildgateService>>,
    Path(method): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> axum::response::Response {
    let method: Method = match method.parse() {
        Ok(method) => method,
        Err(err) => return errors::rpc_error_to_response(err),
    };
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return errors::rpc_error_to_response(RpcError::InvalidArgument(rejection.body_text()));
        }
    };

    match dispatch(service.as_ref(), method, body).await {
        Ok(reply) => (StatusCode::OK, Json(reply)).into_response(),
        Err(err) => {
            tracing::debug!(%method, error = %err, "rpc call failed");
            errors::rpc_error_to_response(err)
        }
    }
}
