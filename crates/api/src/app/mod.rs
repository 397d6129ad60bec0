//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: login, token checks and the RPC service implementation
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: response bodies specific to the REST routes
//! - `errors.rs`: login error codes and error responses

use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;

use guildgate_infra::Services;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::GuildgateService;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Services) -> Router {
    let service = Arc::new(GuildgateService::new(services));

    routes::router().layer(
        ServiceBuilder::new()
            .layer(axum::middleware::from_fn(middleware::request_log))
            .layer(Extension(service)),
    )
}
