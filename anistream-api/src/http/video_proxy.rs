//! Generic media proxy endpoint.
//!
//! Relays an arbitrary upstream URL through the server so players avoid
//! CORS and hotlink checks. The host allow-list is enforced before any
//! outbound request leaves the process.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::Response,
};
use serde::Deserialize;

use crate::http::error::{AppError, AppResult};
use crate::http::AppState;

#[derive(Debug, Deserialize)]
pub struct ProxyParams {
    url: Option<String>,
}

/// GET /`api/video-proxy?url=` - proxy one upstream media URL.
pub async fn video_proxy(
    Query(params): Query<ProxyParams>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let Some(url) = params.url.filter(|u| !u.is_empty()) else {
        return Err(AppError::bad_request("missing url parameter"));
    };
    anistream_proxy::relay(&state.upstream_policy, &url, &headers)
        .await
        .map_err(AppError::from)
}
