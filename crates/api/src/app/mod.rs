//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: storage backend + engines behind the handlers
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and the `{data, meta}` envelope
//! - `errors.rs`: the `{data: null, errors}` envelope and status mapping

use std::sync::Arc;

use axum::{middleware::{from_fn, from_fn_with_state}, routing::get, Extension, Router};
use tower::ServiceBuilder;

use crate::config::AppConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the full HTTP router around already wired services.
pub fn build_app(services: Arc<AppServices>) -> Router {
    // Tenant-required routes: principal first (401), then tenant (400/403).
    let tenant_scoped = routes::router()
        .route_layer(from_fn(middleware::require_tenant))
        .route_layer(from_fn(middleware::require_principal));

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/auth", routes::auth::router())
        .merge(tenant_scoped)
        .layer(Extension(services.clone()))
        .layer(
            ServiceBuilder::new()
                .layer(from_fn(middleware::correlation))
                .layer(from_fn_with_state(services.clone(), middleware::authenticate))
                .layer(from_fn_with_state(services, middleware::resolve_tenant)),
        )
}

/// Public entrypoint used by `main.rs`.
pub async fn build_app_from_config(config: &AppConfig) -> anyhow::Result<Router> {
    let services = services::build_services(config).await?;
    Ok(build_app(Arc::new(services)))
}
