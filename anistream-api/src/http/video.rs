//! Delivery by code.
//!
//! A delivery code minted by the streaming aggregator resolves back to its
//! source snapshot for 24 hours. Vault-backed sources are served through
//! ranged vault reads; everything else relays through the upstream proxy.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
};
use tracing::debug;

use crate::http::error::{AppError, AppResult};
use crate::http::AppState;
use anistream_core::extractor::VaultClient;
use anistream_proxy::range::{content_length, content_range, ByteRange};

/// GET /`api/video/:code` - stream the source behind a delivery code.
pub async fn video_by_code(
    Path(code): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let Some(snapshot) = state.streaming_service.source_by_code(&code).await? else {
        return Err(AppError::not_found("unknown or expired delivery code"));
    };

    // Resolved URL, refreshed on demand, with the raw embed page as the
    // last resort.
    let url = match snapshot.resolved_url.clone() {
        Some(url) => url,
        None => match state.streaming_service.re_extract(&snapshot.raw).await {
            Some(url) => url,
            None => {
                debug!(code = %code, "No resolved URL; serving raw embed URL");
                snapshot.raw.embed_url.clone()
            }
        },
    };

    if let Some(vault) = state
        .vault
        .as_ref()
        .filter(|vault| vault.is_vault_url(&url))
    {
        return serve_vault_range(vault, &url, &headers).await;
    }

    anistream_proxy::relay(&state.upstream_policy, &url, &headers)
        .await
        .map_err(AppError::from)
}

/// Serve a vault file window. The vault streams raw bytes with no range
/// headers, so `Content-Range` and `Content-Length` are computed here from
/// the descriptor's total size.
async fn serve_vault_range(
    vault: &VaultClient,
    url: &str,
    headers: &HeaderMap,
) -> AppResult<Response> {
    let requested = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .map(ByteRange::parse);
    let byte_range = match requested {
        Some(None) => return Err(AppError::bad_request("unsupported Range header")),
        Some(Some(range)) => Some(range),
        None => None,
    };

    let start = byte_range.map_or(0, |r| r.start);
    let end = byte_range.and_then(|r| r.end).unwrap_or(u64::MAX);

    let range = match vault.open_range(url, start, end).await {
        Ok(range) => range,
        Err(anistream_core::Error::InvalidInput(_)) => {
            return Response::builder()
                .status(StatusCode::RANGE_NOT_SATISFIABLE)
                .body(Body::empty())
                .map_err(|e| AppError::internal(e.to_string()));
        }
        Err(err) => return Err(err.into()),
    };

    let last = end.min(range.total_size.saturating_sub(1));
    let mut builder = Response::builder()
        .header(header::CONTENT_TYPE, "video/mp4")
        .header(header::CONTENT_DISPOSITION, "inline")
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .header(header::CONTENT_LENGTH, content_length(start, last));
    builder = if byte_range.is_some() {
        builder
            .status(StatusCode::PARTIAL_CONTENT)
            .header(header::CONTENT_RANGE, content_range(start, last, range.total_size))
    } else {
        builder.status(StatusCode::OK)
    };

    builder
        .body(Body::from_stream(range.stream))
        .map_err(|e| AppError::internal(e.to_string()))
}
