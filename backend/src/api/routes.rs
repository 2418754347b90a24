//! Route definitions for the API.

use axum::{extract::DefaultBodyLimit, middleware, routing::get, Router};

use super::handlers;
use super::middleware::auth::with_api_auth;
use super::middleware::request_id::request_id_middleware;
use super::SharedState;

/// Create the main API router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        // Health endpoint (no auth required)
        .route("/health", get(handlers::health::health_check))
        .nest("/api/v1", api_v1_routes(&state))
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// API v1 routes. Every route is authenticated and rate limited per user.
fn api_v1_routes(state: &SharedState) -> Router<SharedState> {
    Router::new()
        .nest(
            "/permissions",
            with_api_auth(handlers::permissions::router(), state.guard()),
        )
        .nest("/admin", handlers::admin::router(state))
}
