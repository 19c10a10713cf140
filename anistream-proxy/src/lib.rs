//! Delivery proxy utilities
//!
//! Reusable pieces for relaying upstream media through the server: the
//! host allow-list, upstream request shaping (Range, User-Agent, Referer),
//! response header shaping, HLS playlist rewriting, and byte-range math
//! for vault-backed sources. The HTTP routes in `anistream-api` compose
//! these.

pub mod range;

use std::time::Duration;

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::Response,
};
use once_cell::sync::Lazy;
use tracing::{debug, warn};

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

// One pooled client for every relay; the per-policy timeout is applied
// per request.
static HTTP_CLIENT: Lazy<reqwest::Client> =
    Lazy::new(|| reqwest::Client::builder().build().unwrap_or_default());

/// Outbound policy for one relay: which hosts may be fetched and how
/// requests to them are shaped.
#[derive(Debug, Clone)]
pub struct UpstreamPolicy {
    /// Domain suffixes that may be proxied. Empty means nothing passes.
    pub allowed_host_suffixes: Vec<String>,
    /// Hosts that reject requests carrying a User-Agent header.
    pub user_agent_hostile_hosts: Vec<String>,
    /// `(host substring, referer value)` pairs; first match attaches.
    pub referer_rules: Vec<(String, String)>,
    pub timeout: Duration,
}

impl UpstreamPolicy {
    /// Suffix match on the URL's host: `cdn.googlevideo.com` passes for
    /// suffix `googlevideo.com`, `evilgooglevideo.com` does not.
    #[must_use]
    pub fn host_allowed(&self, url: &str) -> bool {
        let Some(host) = url::Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string))
        else {
            return false;
        };
        self.allowed_host_suffixes.iter().any(|suffix| {
            host == *suffix || host.ends_with(&format!(".{suffix}"))
        })
    }

    fn omit_user_agent(&self, host: &str) -> bool {
        self.user_agent_hostile_hosts
            .iter()
            .any(|h| host.contains(h.as_str()))
    }

    fn referer_for(&self, host: &str) -> Option<&str> {
        self.referer_rules
            .iter()
            .find(|(needle, _)| host.contains(needle.as_str()))
            .map(|(_, referer)| referer.as_str())
    }
}

/// Relay one upstream URL to the client.
///
/// The client's `Range` header is forwarded verbatim; upstream status and
/// range headers are mirrored 1:1; the body is streamed chunk by chunk,
/// never buffered. HLS playlists are the exception: they are small, so
/// they are read as text and rewritten before returning.
pub async fn relay(
    policy: &UpstreamPolicy,
    url: &str,
    client_headers: &HeaderMap,
) -> Result<Response, anyhow::Error> {
    if !policy.host_allowed(url) {
        debug!(%url, "Upstream host not in allow-list");
        return Response::builder()
            .status(StatusCode::FORBIDDEN)
            .body(Body::from("upstream host not allowed"))
            .map_err(|e| anyhow::anyhow!("Failed to build response: {e}"));
    }

    let upstream = match fetch_upstream(policy, url, client_headers.get(header::RANGE)).await {
        Ok(upstream) => upstream,
        Err(err) => {
            warn!(%url, %err, "Upstream fetch failed");
            let status = if err.is_timeout() {
                StatusCode::GATEWAY_TIMEOUT
            } else {
                StatusCode::BAD_GATEWAY
            };
            return Response::builder()
                .status(status)
                .body(Body::from("upstream fetch failed"))
                .map_err(|e| anyhow::anyhow!("Failed to build response: {e}"));
        }
    };

    if is_hls(url, upstream.headers().get(header::CONTENT_TYPE)) {
        let status = upstream.status();
        if !status.is_success() {
            return Response::builder()
                .status(status)
                .body(Body::empty())
                .map_err(|e| anyhow::anyhow!("Failed to build response: {e}"));
        }
        let text = upstream
            .text()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read playlist body: {e}"))?;
        let rewritten = rewrite_hls_manifest(&text, url);
        let mut builder = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "application/vnd.apple.mpegurl")
            .header(header::CONTENT_DISPOSITION, "inline");
        builder = apply_cors(builder);
        return builder
            .body(Body::from(rewritten))
            .map_err(|e| anyhow::anyhow!("Failed to build response: {e}"));
    }

    let status = upstream.status();
    let mut builder = Response::builder().status(status);

    let content_type = shaped_content_type(url, upstream.headers().get(header::CONTENT_TYPE));
    builder = builder.header(header::CONTENT_TYPE, content_type);

    for name in [
        header::CONTENT_LENGTH,
        header::ACCEPT_RANGES,
        header::CONTENT_RANGE,
    ] {
        if let Some(value) = upstream.headers().get(&name) {
            builder = builder.header(name, value);
        }
    }
    builder = builder.header(header::CONTENT_DISPOSITION, "inline");
    builder = apply_cors(builder);

    builder
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(|e| anyhow::anyhow!("Failed to build response: {e}"))
}

async fn fetch_upstream(
    policy: &UpstreamPolicy,
    url: &str,
    range: Option<&HeaderValue>,
) -> Result<reqwest::Response, reqwest::Error> {
    let host = url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default();

    let mut request = HTTP_CLIENT.get(url).timeout(policy.timeout);
    if let Some(range) = range {
        request = request.header(header::RANGE, range);
    }
    if !policy.omit_user_agent(&host) {
        request = request.header(header::USER_AGENT, BROWSER_USER_AGENT);
    }
    if let Some(referer) = policy.referer_for(&host) {
        request = request.header(header::REFERER, referer);
    }

    let response = request.send().await?;
    if response.status().is_server_error() {
        warn!(%url, status = %response.status(), "Upstream answered with server error");
    }
    Ok(response)
}

fn apply_cors(builder: axum::http::response::Builder) -> axum::http::response::Builder {
    builder
        .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .header(header::ACCESS_CONTROL_ALLOW_METHODS, "GET, HEAD, OPTIONS")
        .header(header::ACCESS_CONTROL_ALLOW_HEADERS, "Range, Content-Type")
        .header(
            header::ACCESS_CONTROL_EXPOSE_HEADERS,
            "Content-Range, Content-Length, Accept-Ranges",
        )
}

fn is_hls(url: &str, content_type: Option<&HeaderValue>) -> bool {
    if content_type
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("mpegurl"))
    {
        return true;
    }
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.ends_with(".m3u8")
}

/// Mirror the upstream Content-Type, except generic `octet-stream`, which
/// players refuse for streaming: replace it with the extension-derived
/// type.
fn shaped_content_type(url: &str, upstream: Option<&HeaderValue>) -> String {
    let mirrored = upstream
        .and_then(|v| v.to_str().ok())
        .filter(|ct| !ct.contains("octet-stream"))
        .map(str::to_string);
    mirrored.unwrap_or_else(|| content_type_for_path(url).to_string())
}

fn content_type_for_path(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    if path.ends_with(".m3u8") {
        "application/vnd.apple.mpegurl"
    } else if path.ends_with(".webm") {
        "video/webm"
    } else if path.ends_with(".mkv") {
        "video/x-matroska"
    } else if path.ends_with(".ts") {
        "video/mp2t"
    } else {
        "video/mp4"
    }
}

/// Rewrite an HLS playlist so every segment/variant reference is absolute.
///
/// Comment and blank lines pass through untouched; already-absolute URIs
/// pass through; relative ones resolve against the manifest's own URL.
#[must_use]
pub fn rewrite_hls_manifest(manifest: &str, manifest_url: &str) -> String {
    let base = url::Url::parse(manifest_url).ok();
    let mut output = String::with_capacity(manifest.len());
    for line in manifest.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            output.push_str(line);
        } else if trimmed.contains("://") {
            output.push_str(trimmed);
        } else if let Some(resolved) = base.as_ref().and_then(|b| b.join(trimmed).ok()) {
            output.push_str(resolved.as_str());
        } else {
            output.push_str(trimmed);
        }
        output.push('\n');
    }
    output
}
