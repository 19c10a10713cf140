//! Video URL extraction.
//!
//! Turns one embed reference into a directly fetchable media URL. Each
//! provider family implements [`VideoExtractor`]; the registry holds an
//! ordered table of them and dispatches on the first URL match, so adding
//! a provider means registering one entry rather than growing a branch
//! chain.

pub mod berkasdrive;
pub mod blogger;
pub mod direct;
pub mod filedon;
pub mod mp4upload;
pub mod packed;
pub mod vault;
pub mod wibufile;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::RawSource;
use crate::traits::CacheStore;

pub use berkasdrive::BerkasdriveExtractor;
pub use blogger::BloggerExtractor;
pub use direct::DirectLinkExtractor;
pub use filedon::FiledonExtractor;
pub use mp4upload::Mp4uploadExtractor;
pub use packed::PackedScriptExtractor;
pub use vault::{VaultClient, VaultDescriptor, VaultExtractor};
pub use wibufile::WibufileExtractor;

/// One extraction strategy for a provider family.
#[async_trait]
pub trait VideoExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this strategy handles the given embed URL.
    fn matches(&self, url: &str) -> bool;

    /// Resolve the embed reference to a direct URL. `Ok(None)` means the
    /// page no longer exposes a stream; errors are upstream/parse failures
    /// the registry will absorb.
    async fn extract(&self, source: &RawSource) -> Result<Option<String>>;
}

/// Result of running a source through the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    Resolved(String),
    /// No strategy matched, the page had no stream, or extraction failed.
    /// The caller keeps the raw embed URL as a last resort.
    Unavailable,
    /// The provider signalled a quota/rate limit; the caller should stop
    /// hitting it for now.
    RateLimited,
}

pub struct ExtractorRegistry {
    extractors: Vec<Arc<dyn VideoExtractor>>,
    cache: Arc<dyn CacheStore>,
    resolved_ttl: Duration,
}

impl ExtractorRegistry {
    #[must_use]
    pub fn new(cache: Arc<dyn CacheStore>, resolved_ttl: Duration) -> Self {
        Self {
            extractors: Vec::new(),
            cache,
            resolved_ttl,
        }
    }

    /// Append a strategy. Order matters: the first matching entry wins.
    pub fn register(&mut self, extractor: Arc<dyn VideoExtractor>) {
        self.extractors.push(extractor);
    }

    #[must_use]
    pub fn find(&self, url: &str) -> Option<&Arc<dyn VideoExtractor>> {
        self.extractors.iter().find(|e| e.matches(url))
    }

    fn cache_key(source: &RawSource) -> String {
        format!("resolved:{}:{}", source.provider, source.embed_url)
    }

    /// Run one source through its strategy, with a resolved-URL cache in
    /// front. Failures are never cached.
    pub async fn extract(&self, source: &RawSource) -> ExtractionOutcome {
        let key = Self::cache_key(source);
        if let Ok(Some(cached)) = self.cache.get(&key).await {
            if let Some(url) = cached.as_str() {
                debug!(embed = %source.embed_url, "Resolved URL cache hit");
                return ExtractionOutcome::Resolved(url.to_string());
            }
        }

        let Some(extractor) = self.find(&source.embed_url) else {
            debug!(embed = %source.embed_url, "No extraction strategy registered");
            return ExtractionOutcome::Unavailable;
        };

        match extractor.extract(source).await {
            Ok(Some(url)) => {
                if let Err(err) = self
                    .cache
                    .put(&key, serde_json::Value::String(url.clone()), self.resolved_ttl)
                    .await
                {
                    warn!(%err, "Failed to cache resolved URL");
                }
                ExtractionOutcome::Resolved(url)
            }
            Ok(None) => {
                debug!(
                    extractor = extractor.name(),
                    embed = %source.embed_url,
                    "No stream found in embed page"
                );
                ExtractionOutcome::Unavailable
            }
            Err(err) if err.is_rate_limit() => {
                warn!(extractor = extractor.name(), %err, "Extraction rate limited");
                ExtractionOutcome::RateLimited
            }
            Err(err) => {
                warn!(
                    extractor = extractor.name(),
                    embed = %source.embed_url,
                    %err,
                    "Extraction failed"
                );
                ExtractionOutcome::Unavailable
            }
        }
    }
}

/// Shared HTTP client for extractor page fetches: browser-like UA, fixed
/// timeout, redirects followed.
pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
        .build()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Resolution;
    use crate::store::MemoryCacheStore;

    struct StaticExtractor {
        name: &'static str,
        needle: &'static str,
        result: Option<String>,
    }

    #[async_trait]
    impl VideoExtractor for StaticExtractor {
        fn name(&self) -> &'static str {
            self.name
        }

        fn matches(&self, url: &str) -> bool {
            url.contains(self.needle)
        }

        async fn extract(&self, _source: &RawSource) -> Result<Option<String>> {
            Ok(self.result.clone())
        }
    }

    fn source(url: &str) -> RawSource {
        RawSource {
            provider: "samehadaku".to_string(),
            embed_url: url.to_string(),
            resolution: Resolution::P720,
            server: 1,
            title_hint: None,
        }
    }

    fn registry() -> ExtractorRegistry {
        ExtractorRegistry::new(
            Arc::new(MemoryCacheStore::new()),
            Duration::from_secs(6 * 60 * 60),
        )
    }

    #[tokio::test]
    async fn first_matching_entry_wins() {
        let mut reg = registry();
        reg.register(Arc::new(StaticExtractor {
            name: "a",
            needle: "host.example",
            result: Some("https://cdn.example/a.mp4".to_string()),
        }));
        reg.register(Arc::new(StaticExtractor {
            name: "b",
            needle: "host.example",
            result: Some("https://cdn.example/b.mp4".to_string()),
        }));

        let outcome = reg.extract(&source("https://host.example/embed/1")).await;
        assert_eq!(
            outcome,
            ExtractionOutcome::Resolved("https://cdn.example/a.mp4".to_string())
        );
    }

    #[tokio::test]
    async fn unmatched_url_is_unavailable() {
        let reg = registry();
        let outcome = reg.extract(&source("https://unknown.example/x")).await;
        assert_eq!(outcome, ExtractionOutcome::Unavailable);
    }

    #[tokio::test]
    async fn successes_are_cached_failures_are_not() {
        let cache: Arc<MemoryCacheStore> = Arc::new(MemoryCacheStore::new());
        let mut reg = ExtractorRegistry::new(cache.clone(), Duration::from_secs(60));
        reg.register(Arc::new(StaticExtractor {
            name: "ok",
            needle: "good.example",
            result: Some("https://cdn.example/v.mp4".to_string()),
        }));
        reg.register(Arc::new(StaticExtractor {
            name: "none",
            needle: "bad.example",
            result: None,
        }));

        reg.extract(&source("https://good.example/e/1")).await;
        reg.extract(&source("https://bad.example/e/2")).await;

        let hit = cache
            .get("resolved:samehadaku:https://good.example/e/1")
            .await
            .expect("get");
        assert!(hit.is_some());

        let miss = cache
            .get("resolved:samehadaku:https://bad.example/e/2")
            .await
            .expect("get");
        assert!(miss.is_none());
    }
}
