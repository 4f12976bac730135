use axum::{routing::get, Router};

pub mod ar;
pub mod auth;
pub mod invoices;
pub mod system;

/// Router for all authenticated, tenant-scoped endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/invoices", invoices::router())
        .nest("/ar", ar::router())
}
