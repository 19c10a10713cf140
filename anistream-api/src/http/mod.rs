// Module: http
// HTTP/JSON API surface

pub mod catalog;
pub mod error;
pub mod health;
pub mod streaming;
pub mod video;
pub mod video_proxy;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use anistream_core::extractor::VaultClient;
use anistream_core::service::{DetailService, StreamingService};
use anistream_proxy::UpstreamPolicy;

pub use error::{AppError, AppResult};

/// Validate a path id: positive and within `u32`. Ids beyond `u32::MAX`
/// are rejected rather than truncated.
pub(crate) fn positive_u32(value: i64, what: &str) -> Result<u32, AppError> {
    u32::try_from(value)
        .ok()
        .filter(|&v| v > 0)
        .ok_or_else(|| AppError::bad_request(format!("{what} must be a positive integer")))
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub detail_service: Arc<DetailService>,
    pub streaming_service: Arc<StreamingService>,
    pub upstream_policy: Arc<UpstreamPolicy>,
    pub vault: Option<Arc<VaultClient>>,
}

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/catalog/{id}", get(catalog::catalog_detail))
        .route(
            "/api/streaming/{id}/{episode}",
            get(streaming::episode_streams),
        )
        .route("/api/video/{code}", get(video::video_by_code))
        .route("/api/video-proxy", get(video_proxy::video_proxy))
        .merge(health::create_health_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
