use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Create the API router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health
        .route("/health", get(handlers::health_check))

        // Layer definitions
        .route("/api/v1/qlr", get(handlers::get_qlr))
        .route("/api/v1/collections", get(handlers::list_collections))

        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
