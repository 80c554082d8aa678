//! Router configuration for the API server.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use super::handlers;
use super::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/analyze", post(handlers::analyze))
        .route(
            "/api/library",
            post(handlers::save_to_library).get(handlers::get_library),
        )
        .route(
            "/api/library/:analysis_id",
            delete(handlers::delete_from_library),
        )
        .route("/api/users", post(handlers::create_user))
        .route("/api/health", get(|| async { "ok" }))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
