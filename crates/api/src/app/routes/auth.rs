use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};

use guildgate_rpc::AuthUserCredentialsRequest;

use crate::app::dto::LoginResponse;
use crate::app::errors::{self, AuthError};
use crate::app::services::GuildgateService;
use crate::middleware::extract_bearer;

/// `POST /auth/credentials`: `{username | email, password}` login.
pub async fn credentials(
    Extension(service): Extension<Arc<GuildgateService>>,
    body: Result<Json<AuthUserCredentialsRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => return AuthError::MalformedBody(rejection.body_text()).into_response(),
    };

    match service.login(req).await {
        Ok((user, token)) => (StatusCode::OK, Json(LoginResponse::new(&user, token))).into_response(),
        Err(err) => err.into_response(),
    }
}

/// `POST /token`: is the bearer token a live session?
pub async fn token(
    Extension(service): Extension<Arc<GuildgateService>>,
    headers: HeaderMap,
) -> axum::response::Response {
    let token = match extract_bearer(&headers) {
        Ok(token) => token,
        Err(status) => return errors::json_error(status, "unauthorized", "missing bearer token"),
    };

    let resp = service.check_token(token).await;
    let status = if resp.code == 0 {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(resp)).into_response()
}
