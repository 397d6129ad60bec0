use axum::{
    routing::{get, post},
    Router,
};

pub mod auth;
pub mod rpc;
pub mod system;

/// Router for every public endpoint.
pub fn router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/auth/credentials", post(auth::credentials))
        .route("/token", post(auth::token))
        .route("/rpc/:method", post(rpc::call))
}
