//! Router configuration for the read API.

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;

use super::handlers;
use super::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/activities", get(handlers::list_activities))
        .route(
            "/activities/suggestions",
            get(handlers::activity_suggestions),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}
