//! Route-level tests against the assembled router with in-memory stores.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::util::ServiceExt;

use anistream_api::http::{create_router, AppState};
use anistream_core::clock::SystemClock;
use anistream_core::extractor::ExtractorRegistry;
use anistream_core::matcher::{IdentityResolver, ListingMemo};
use anistream_core::service::{DetailService, StreamingService};
use anistream_core::store::{MemoryCacheStore, MemorySlugMappingStore, MemoryStorageLedger};
use anistream_core::traits::{CacheStore, NullCatalogClient, NullDispatcher, SlugMappingStore};
use anistream_proxy::UpstreamPolicy;

fn test_state(allowed_host_suffixes: Vec<String>) -> AppState {
    let cache: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::new());
    let mappings: Arc<dyn SlugMappingStore> = Arc::new(MemorySlugMappingStore::new());
    let registry = Arc::new(ExtractorRegistry::new(
        Arc::clone(&cache),
        Duration::from_secs(6 * 60 * 60),
    ));
    let listing_memo = Arc::new(ListingMemo::new(
        Arc::new(SystemClock),
        Duration::from_secs(300),
    ));
    let resolver = Arc::new(IdentityResolver::new(
        Vec::new(),
        Arc::clone(&mappings),
        listing_memo,
    ));

    let streaming_service = Arc::new(StreamingService::new(
        Vec::new(),
        Arc::clone(&mappings),
        Arc::clone(&cache),
        registry,
        Arc::new(MemoryStorageLedger::new()),
        Arc::new(NullDispatcher),
        Vec::new(),
        None,
        Duration::from_secs(20 * 60),
        Duration::from_secs(24 * 60 * 60),
        "http://localhost:8080".to_string(),
    ));
    let detail_service = Arc::new(DetailService::new(
        Arc::new(NullCatalogClient),
        Vec::new(),
        mappings,
        resolver,
    ));

    AppState {
        detail_service,
        streaming_service,
        upstream_policy: Arc::new(UpstreamPolicy {
            allowed_host_suffixes,
            user_agent_hostile_hosts: Vec::new(),
            referer_rules: Vec::new(),
            timeout: Duration::from_secs(5),
        }),
        vault: None,
    }
}

async fn get(state: AppState, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = create_router(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, body)
}

#[tokio::test]
async fn healthz_answers_ok() {
    let response = create_router(test_state(Vec::new()))
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn catalog_rejects_non_positive_id() {
    let (status, body) = get(test_state(Vec::new()), "/api/catalog/0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn streaming_rejects_non_positive_episode() {
    let (status, _) = get(test_state(Vec::new()), "/api/streaming/42/0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn ids_beyond_u32_are_rejected_not_truncated() {
    // 4294967297 wraps to 1 under a narrowing cast; it must 400 instead of
    // silently serving catalog id 1.
    let (status, body) = get(test_state(Vec::new()), "/api/catalog/4294967297").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = get(test_state(Vec::new()), "/api/streaming/4294967297/1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(test_state(Vec::new()), "/api/streaming/42/4294967297").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn streaming_without_mapping_is_an_empty_200() {
    let (status, body) = get(test_state(Vec::new()), "/api/streaming/42/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["catalog_id"], 42);
    assert_eq!(body["episode"], 1);
    assert_eq!(body["sources"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn unknown_delivery_code_is_404() {
    let (status, _) = get(test_state(Vec::new()), "/api/video/nope1234").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn video_proxy_requires_a_url() {
    let (status, body) = get(test_state(Vec::new()), "/api/video-proxy").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn video_proxy_blocks_hosts_off_the_allow_list() {
    let state = test_state(vec!["allowed.example".to_string()]);
    let response = create_router(state)
        .oneshot(
            Request::builder()
                .uri("/api/video-proxy?url=https%3A%2F%2Fother.example%2Fv.mp4")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn video_proxy_relays_an_allowed_upstream() {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v/ep1.mp4"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "video/mp4")
                .insert_header("Content-Length", "4")
                .set_body_bytes(b"data".to_vec()),
        )
        .mount(&server)
        .await;

    let state = test_state(vec!["localhost".to_string()]);
    let upstream = format!(
        "{}/v/ep1.mp4",
        server.uri().replace("127.0.0.1", "localhost")
    );
    let encoded: String = percent_encoding::utf8_percent_encode(
        &upstream,
        percent_encoding::NON_ALPHANUMERIC,
    )
    .to_string();

    let response = create_router(state)
        .oneshot(
            Request::builder()
                .uri(format!("/api/video-proxy?url={encoded}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-disposition"], "inline");
    assert_eq!(response.headers()["access-control-allow-origin"], "*");

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"data");
}
