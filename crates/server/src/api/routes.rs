use axum::{extract::DefaultBodyLimit, middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{handlers, middleware::metrics_middleware, submissions};
use crate::state::AppState;

/// Room for the JSON envelope around the image data URI.
const BODY_OVERHEAD_BYTES: usize = 16 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state
        .config()
        .submissions
        .max_image_bytes
        .saturating_add(BODY_OVERHEAD_BYTES);

    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Submissions
        .route(
            "/submissions",
            get(submissions::list_submissions).post(submissions::create_submission),
        )
        .route("/submissions/{id}", get(submissions::get_submission))
        .layer(DefaultBodyLimit::max(body_limit));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
