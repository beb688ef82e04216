//! Web application router and middleware setup.

use crate::web::handlers;
use axum::{routing::get, Router};
use prometheus::Registry;
use tower_http::trace::TraceLayer;

/// Create the axum application serving `registry`.
pub fn create_app(registry: Registry) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/metrics", get(handlers::metrics))
        .route("/health", get(handlers::health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(registry)
}
