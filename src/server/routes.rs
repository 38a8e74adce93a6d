use crate::server::{handlers, types::AppState};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub fn create_router(state: AppState, max_body_bytes: usize) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ping", get(handlers::ping))
        .route("/metrics", get(handlers::metrics))
        .route("/invocations", post(handlers::invocations))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}
