use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

/// Multipart framing allowance on top of the file itself.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Outer ceiling only; the upload handler caps the file part per caller while streaming
    let upload_limit = match state.config.limits.size_limit_admin {
        Some(admin) => DefaultBodyLimit::max(
            (admin.max(state.config.limits.size_limit) + MULTIPART_OVERHEAD) as usize,
        ),
        None => DefaultBodyLimit::disable(),
    };

    Router::new()
        .route("/upload", post(handlers::upload_file).layer(upload_limit))
        .route("/short", post(handlers::create_shortlink))
        .route("/populate", post(handlers::populate))
        // Internal
        .route("/_internal/health", get(handlers::health))
        // Key resolution
        .route("/:key", get(handlers::resolve_entry))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
