//! Collaborator seams.
//!
//! Per-site scraping, the catalog lookup client, and all durable storage
//! live outside this crate. These traits contract exactly what the pipeline
//! consumes from them; implementations are injected at bootstrap.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;
use crate::models::{ArchivedVideo, CatalogRecord, RawSource, ScrapedCandidate, SlugMapping};

/// A provider-listing entry: slug plus display title.
#[derive(Debug, Clone)]
pub struct ListingEntry {
    pub slug: String,
    pub title: String,
}

/// One third-party source site.
#[async_trait]
pub trait ScraperAdapter: Send + Sync {
    /// Provider name, also used as the sort key for streaming sources.
    fn name(&self) -> &'static str;

    /// Current full listing of titles on the provider (front page scan).
    async fn listing(&self) -> Result<Vec<ListingEntry>>;

    /// Detail page for one slug: metadata and the episode list.
    async fn detail(&self, slug: &str) -> Result<ScrapedCandidate>;

    /// Embed references for one episode page.
    async fn episode_sources(&self, slug: &str, episode: u32) -> Result<Vec<RawSource>>;

    /// Deterministic episode page URL for a known slug.
    fn episode_url(&self, slug: &str, episode: u32) -> String;
}

/// Canonical metadata service client.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn by_id(&self, id: u32) -> Result<CatalogRecord>;

    async fn search(&self, title: &str) -> Result<Vec<CatalogRecord>>;
}

/// TTL-keyed cache sitting between pipeline stages.
///
/// Values are JSON; expired entries are never returned; concurrent
/// populate races are last-writer-wins.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>>;

    async fn put(&self, key: &str, value: serde_json::Value, ttl: Duration) -> Result<()>;
}

/// Persistent catalog-id -> slug mapping store.
#[async_trait]
pub trait SlugMappingStore: Send + Sync {
    async fn get(&self, catalog_id: u32) -> Result<Option<SlugMapping>>;

    /// Idempotent upsert keyed by catalog id.
    async fn upsert(&self, mapping: SlugMapping) -> Result<()>;
}

/// External archival ledger of episode copies uploaded to cold storage.
#[async_trait]
pub trait StorageLedger: Send + Sync {
    async fn query(&self, catalog_id: u32, episode: u32) -> Result<Vec<ArchivedVideo>>;

    async fn append(&self, entry: ArchivedVideo) -> Result<()>;
}

/// Fire-and-forget notification when new deliverable items were queued for
/// archival. Failures are the collaborator's problem, never the caller's.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn notify(&self, catalog_id: u32, episode: u32, new_codes: &[String]);
}

/// No-op dispatcher for wiring without an archival pipeline.
pub struct NullDispatcher;

#[async_trait]
impl Dispatcher for NullDispatcher {
    async fn notify(&self, _catalog_id: u32, _episode: u32, _new_codes: &[String]) {}
}

/// Placeholder catalog client for wiring before a real one is injected.
/// Every lookup answers `NotFound`.
pub struct NullCatalogClient;

#[async_trait]
impl CatalogClient for NullCatalogClient {
    async fn by_id(&self, id: u32) -> Result<CatalogRecord> {
        Err(crate::error::Error::NotFound(format!(
            "no catalog client configured (id {id})"
        )))
    }

    async fn search(&self, _title: &str) -> Result<Vec<CatalogRecord>> {
        Err(crate::error::Error::NotFound(
            "no catalog client configured".to_string(),
        ))
    }
}
