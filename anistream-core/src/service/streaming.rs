//! Streaming aggregation.
//!
//! One entry point: catalog id + episode number in, the full set of
//! playable sources out. Scraping fans out per provider, extraction runs
//! parallel except for the quota-limited vault queue, and every surviving
//! source gets a delivery code the `/api/video/:code` route can serve for
//! 24 hours.

use futures::future::join_all;
use nanoid::nanoid;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::extractor::{ExtractionOutcome, ExtractorRegistry};
use crate::models::{ArchivedVideo, RawSource, StorageTier, StreamingSource};
use crate::traits::{CacheStore, Dispatcher, ScraperAdapter, SlugMappingStore, StorageLedger};

const CODE_LEN: usize = 8;

/// Outcome of one pass through the vault extraction queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultOutcome {
    Resolved(String),
    Unavailable,
    /// The quota limit fired on this item; the queue halts here.
    RateLimited,
    /// Never attempted because the queue already halted.
    Skipped,
}

/// One source as shaped for API consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingItem {
    pub code: String,
    pub provider: String,
    pub resolution: String,
    pub raw_url: String,
    pub resolved_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_proxy_url: Option<String>,
}

/// Full aggregation result for one episode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeStreams {
    pub catalog_id: u32,
    pub episode: u32,
    pub sources: Vec<StreamingItem>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub saved_videos: Vec<ArchivedVideo>,
}

pub struct StreamingService {
    adapters: Vec<Arc<dyn ScraperAdapter>>,
    mappings: Arc<dyn SlugMappingStore>,
    cache: Arc<dyn CacheStore>,
    registry: Arc<ExtractorRegistry>,
    ledger: Arc<dyn StorageLedger>,
    dispatcher: Arc<dyn Dispatcher>,
    deny_list: Vec<String>,
    /// Embed URLs containing this needle belong to the quota-limited vault
    /// and go through the sequential queue.
    quota_needle: Option<String>,
    set_ttl: Duration,
    code_ttl: Duration,
    public_base_url: String,
}

impl StreamingService {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        adapters: Vec<Arc<dyn ScraperAdapter>>,
        mappings: Arc<dyn SlugMappingStore>,
        cache: Arc<dyn CacheStore>,
        registry: Arc<ExtractorRegistry>,
        ledger: Arc<dyn StorageLedger>,
        dispatcher: Arc<dyn Dispatcher>,
        deny_list: Vec<String>,
        quota_needle: Option<String>,
        set_ttl: Duration,
        code_ttl: Duration,
        public_base_url: String,
    ) -> Self {
        Self {
            adapters,
            mappings,
            cache,
            registry,
            ledger,
            dispatcher,
            deny_list,
            quota_needle,
            set_ttl,
            code_ttl,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn set_key(catalog_id: u32, episode: u32) -> String {
        format!("streaming:{catalog_id}:{episode}")
    }

    fn code_key(code: &str) -> String {
        format!("code:{code}")
    }

    fn denied(&self, url: &str) -> bool {
        self.deny_list.iter().any(|needle| url.contains(needle))
    }

    fn is_vault_source(&self, source: &RawSource) -> bool {
        self.quota_needle
            .as_deref()
            .is_some_and(|needle| source.embed_url.contains(needle))
    }

    fn sort_sources(sources: &mut [StreamingSource]) {
        sources.sort_by(|a, b| {
            a.raw
                .provider
                .cmp(&b.raw.provider)
                .then_with(|| Reverse(a.raw.resolution.rank()).cmp(&Reverse(b.raw.resolution.rank())))
                .then_with(|| a.raw.server.cmp(&b.raw.server))
        });
    }

    fn shape(&self, source: &StreamingSource) -> StreamingItem {
        let public_proxy_url = source.resolved_url.as_deref().map(|url| {
            let encoded = percent_encoding::utf8_percent_encode(
                url,
                percent_encoding::NON_ALPHANUMERIC,
            );
            format!("{}/api/video-proxy?url={encoded}", self.public_base_url)
        });
        StreamingItem {
            code: source.code.clone(),
            provider: source.raw.provider.clone(),
            resolution: source.raw.resolution.label().to_string(),
            raw_url: source.raw.embed_url.clone(),
            resolved_url: source.resolved_url.clone(),
            public_proxy_url,
        }
    }

    /// Look up the snapshot behind a delivery code.
    pub async fn source_by_code(&self, code: &str) -> Result<Option<StreamingSource>> {
        match self.cache.get(&Self::code_key(code)).await? {
            Some(value) => Ok(serde_json::from_value(value).ok()),
            None => Ok(None),
        }
    }

    /// Resolve one raw source on demand, bypassing the snapshot. Used when
    /// a code is served after its resolved URL went stale.
    pub async fn re_extract(&self, raw: &RawSource) -> Option<String> {
        match self.registry.extract(raw).await {
            ExtractionOutcome::Resolved(url) => Some(url),
            _ => None,
        }
    }

    /// Aggregate all playable sources for one episode.
    pub async fn episode_streams(&self, catalog_id: u32, episode: u32) -> Result<EpisodeStreams> {
        let key = Self::set_key(catalog_id, episode);

        let mut sources = match self.cache.get(&key).await? {
            Some(value) => {
                let cached: Vec<StreamingSource> = serde_json::from_value(value)?;
                debug!(catalog_id, episode, "Streaming set cache hit");
                cached
                    .into_iter()
                    .filter(|s| !self.denied(&s.raw.embed_url))
                    .collect()
            }
            None => {
                let built = self.build_sources(catalog_id, episode).await?;
                if let Err(err) = self
                    .cache
                    .put(&key, serde_json::to_value(&built)?, self.set_ttl)
                    .await
                {
                    warn!(%err, "Failed to cache streaming set");
                }
                self.notify_dispatcher(catalog_id, episode, &built);
                built
            }
        };

        Self::sort_sources(&mut sources);

        let saved_videos = match self.ledger.query(catalog_id, episode).await {
            Ok(rows) => rows,
            Err(err) => {
                warn!(catalog_id, episode, %err, "Storage ledger query failed");
                Vec::new()
            }
        };
        for source in &mut sources {
            let archived = saved_videos.iter().find(|row| {
                row.resolution == source.raw.resolution && row.server == source.raw.server
            });
            if let Some(row) = archived {
                source.resolved_url = Some(row.url.clone());
                source.tier = StorageTier::Archived;
            }
        }

        let items = sources.iter().map(|s| self.shape(s)).collect();
        Ok(EpisodeStreams {
            catalog_id,
            episode,
            sources: items,
            saved_videos,
        })
    }

    /// Scrape, filter, extract, and mint codes for one episode. Cache miss
    /// path only.
    async fn build_sources(&self, catalog_id: u32, episode: u32) -> Result<Vec<StreamingSource>> {
        let Some(mapping) = self.mappings.get(catalog_id).await? else {
            debug!(catalog_id, "No slug mapping; empty streaming set");
            return Ok(Vec::new());
        };

        let scrapes = self.adapters.iter().filter_map(|adapter| {
            let slug = mapping.slug_for(adapter.name())?.to_string();
            Some(async move {
                let name = adapter.name();
                match adapter.episode_sources(&slug, episode).await {
                    Ok(sources) => sources,
                    Err(err) => {
                        warn!(provider = name, %slug, episode, %err, "Episode scrape failed");
                        Vec::new()
                    }
                }
            })
        });
        let raw: Vec<RawSource> = join_all(scrapes)
            .await
            .into_iter()
            .flatten()
            .filter(|s| !self.denied(&s.embed_url))
            .collect();

        let (vault, plain): (Vec<RawSource>, Vec<RawSource>) =
            raw.into_iter().partition(|s| self.is_vault_source(s));

        let plain_resolved = join_all(plain.iter().map(|s| self.registry.extract(s))).await;
        let mut resolved: Vec<(RawSource, Option<String>)> = plain
            .into_iter()
            .zip(plain_resolved)
            .map(|(source, outcome)| match outcome {
                ExtractionOutcome::Resolved(url) => (source, Some(url)),
                _ => (source, None),
            })
            .collect();

        let vault_outcomes = self.drain_vault_queue(&vault).await;
        resolved.extend(vault.into_iter().zip(vault_outcomes).map(
            |(source, outcome)| match outcome {
                VaultOutcome::Resolved(url) => (source, Some(url)),
                _ => (source, None),
            },
        ));

        let mut sources = Vec::with_capacity(resolved.len());
        for (raw, resolved_url) in resolved {
            let code = nanoid!(CODE_LEN);
            let source = StreamingSource {
                raw,
                resolved_url,
                code: code.clone(),
                tier: StorageTier::Fresh,
            };
            if let Err(err) = self
                .cache
                .put(
                    &Self::code_key(&code),
                    serde_json::to_value(&source)?,
                    self.code_ttl,
                )
                .await
            {
                warn!(%err, code = %code, "Failed to persist delivery code");
            }
            sources.push(source);
        }
        info!(
            catalog_id,
            episode,
            total = sources.len(),
            resolved = sources.iter().filter(|s| s.resolved_url.is_some()).count(),
            "Streaming set built"
        );
        Ok(sources)
    }

    /// Consume vault sources one at a time, best resolution first, halting
    /// for good on the first quota signal. Halted items are skipped, not
    /// failed: nothing was attempted for them.
    pub async fn drain_vault_queue(&self, sources: &[RawSource]) -> Vec<VaultOutcome> {
        let mut order: Vec<usize> = (0..sources.len()).collect();
        order.sort_by_key(|&i| Reverse(sources[i].resolution.rank()));

        let mut outcomes = vec![VaultOutcome::Skipped; sources.len()];
        let mut halted = false;
        for index in order {
            if halted {
                debug!(embed = %sources[index].embed_url, "Vault queue halted; skipping");
                continue;
            }
            outcomes[index] = match self.registry.extract(&sources[index]).await {
                ExtractionOutcome::Resolved(url) => VaultOutcome::Resolved(url),
                ExtractionOutcome::Unavailable => VaultOutcome::Unavailable,
                ExtractionOutcome::RateLimited => {
                    warn!("Vault quota exhausted; halting extraction queue");
                    halted = true;
                    VaultOutcome::RateLimited
                }
            };
        }
        outcomes
    }

    fn notify_dispatcher(&self, catalog_id: u32, episode: u32, sources: &[StreamingSource]) {
        let new_codes: Vec<String> = sources
            .iter()
            .filter(|s| s.resolved_url.is_some())
            .map(|s| s.code.clone())
            .collect();
        if new_codes.is_empty() {
            return;
        }
        let dispatcher = Arc::clone(&self.dispatcher);
        tokio::spawn(async move {
            dispatcher.notify(catalog_id, episode, &new_codes).await;
        });
    }
}
