//! Health check endpoint for monitoring probes.

use axum::{response::IntoResponse, routing::get, Router};

use crate::http::AppState;

pub fn create_health_router() -> Router<AppState> {
    Router::new().route("/healthz", get(health_check))
}

/// Always OK while the server is up.
pub async fn health_check() -> impl IntoResponse {
    "OK"
}
