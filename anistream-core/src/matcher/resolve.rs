//! Identity resolution engine.
//!
//! Maps one catalog record to a per-provider slug, probing candidate slugs
//! against each provider's detail pages with the four-layer scorer. Probing
//! runs as an explicit state machine:
//!
//! `Scanning(candidates) -> Accepted(match) | Fallback(listing) -> Accepted | Unresolved`
//!
//! Any single probe failure is swallowed and logged; a fully unresolved
//! provider persists as a null slug, which is an ordinary outcome, not an
//! error.

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::models::{CatalogRecord, ProviderSlug, ScrapedCandidate, SlugMapping};
use crate::traits::{ScraperAdapter, SlugMappingStore};

use super::listing::ListingMemo;
use super::score::{
    dice_similarity, score_candidate, ACCEPT_CONFIDENCE, EARLY_STOP_CONFIDENCE,
    FALLBACK_ACCEPT_CONFIDENCE,
};
use super::slug::slug_variations;

/// Minimum slug-string similarity for a listing entry to be probed in the
/// fallback phase.
const FALLBACK_SLUG_SIMILARITY: f64 = 0.70;
/// How many fuzzy listing matches are probed before giving up.
const FALLBACK_PROBE_LIMIT: usize = 5;

/// An accepted provider match, including the fetched detail so callers can
/// reuse the episode list without a second fetch.
#[derive(Debug, Clone)]
pub struct AcceptedMatch {
    pub slug: String,
    pub confidence: f64,
    pub detail: ScrapedCandidate,
}

/// Per-provider probe result.
#[derive(Debug, Clone)]
pub enum ProbeOutcome {
    Accepted(AcceptedMatch),
    Unresolved,
}

/// Full engine output for one catalog record.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub mapping: SlugMapping,
    /// Details for the providers that matched, keyed by provider name.
    pub details: HashMap<String, ScrapedCandidate>,
}

pub struct IdentityResolver {
    adapters: Vec<Arc<dyn ScraperAdapter>>,
    mappings: Arc<dyn SlugMappingStore>,
    listing_memo: Arc<ListingMemo>,
}

impl IdentityResolver {
    #[must_use]
    pub fn new(
        adapters: Vec<Arc<dyn ScraperAdapter>>,
        mappings: Arc<dyn SlugMappingStore>,
        listing_memo: Arc<ListingMemo>,
    ) -> Self {
        Self {
            adapters,
            mappings,
            listing_memo,
        }
    }

    /// Resolve all providers for a catalog record and persist the mapping.
    ///
    /// Providers are probed concurrently; the persisted row carries a null
    /// slug for every provider that did not match.
    pub async fn resolve(&self, catalog: &CatalogRecord) -> Result<Resolution> {
        let candidates = slug_variations(&catalog.title, catalog.title_english.as_deref());
        debug!(
            catalog_id = catalog.id,
            candidate_count = candidates.len(),
            "Resolving identity"
        );

        let probes = self
            .adapters
            .iter()
            .map(|adapter| self.probe_provider(adapter.as_ref(), catalog, &candidates));
        let outcomes = join_all(probes).await;

        let mut providers = HashMap::new();
        let mut details = HashMap::new();

        for (adapter, outcome) in self.adapters.iter().zip(outcomes) {
            match outcome {
                ProbeOutcome::Accepted(m) => {
                    info!(
                        catalog_id = catalog.id,
                        provider = adapter.name(),
                        slug = %m.slug,
                        confidence = m.confidence,
                        "Identity resolved"
                    );
                    providers.insert(
                        adapter.name().to_string(),
                        ProviderSlug {
                            slug: Some(m.slug),
                            confidence: Some(m.confidence.round() as u8),
                        },
                    );
                    details.insert(adapter.name().to_string(), m.detail);
                }
                ProbeOutcome::Unresolved => {
                    warn!(
                        catalog_id = catalog.id,
                        provider = adapter.name(),
                        "No identity match"
                    );
                    providers.insert(adapter.name().to_string(), ProviderSlug::default());
                }
            }
        }

        let now = chrono::Utc::now();
        let mapping = SlugMapping {
            catalog_id: catalog.id,
            providers,
            created_at: now,
            updated_at: now,
        };
        self.mappings.upsert(mapping.clone()).await?;

        Ok(Resolution { mapping, details })
    }

    /// Run the probe state machine against one provider.
    pub async fn probe_provider(
        &self,
        adapter: &dyn ScraperAdapter,
        catalog: &CatalogRecord,
        candidates: &[String],
    ) -> ProbeOutcome {
        // Scanning phase.
        let mut accepted: Vec<AcceptedMatch> = Vec::new();

        for slug in candidates {
            match self.probe_slug(adapter, catalog, slug, ACCEPT_CONFIDENCE).await {
                Some(m) if m.confidence >= EARLY_STOP_CONFIDENCE => {
                    return ProbeOutcome::Accepted(m);
                }
                Some(m) => accepted.push(m),
                None => {}
            }
        }

        if let Some(best) = take_best(&mut accepted) {
            return ProbeOutcome::Accepted(best);
        }

        // Fallback phase: fuzzy-match candidate slugs against the live
        // listing, probe the closest few.
        debug!(
            provider = adapter.name(),
            "No direct slug match, entering listing fallback"
        );
        let listing = match self.provider_listing(adapter).await {
            Some(listing) => listing,
            None => return ProbeOutcome::Unresolved,
        };

        let mut fuzzy: Vec<(String, f64)> = listing
            .iter()
            .map(|entry| {
                let best = candidates
                    .iter()
                    .map(|c| dice_similarity(c, &entry.slug))
                    .fold(0.0f64, f64::max);
                (entry.slug.clone(), best)
            })
            .filter(|(_, sim)| *sim >= FALLBACK_SLUG_SIMILARITY)
            .collect();
        fuzzy.sort_by(|a, b| b.1.total_cmp(&a.1));

        for (slug, similarity) in fuzzy.into_iter().take(FALLBACK_PROBE_LIMIT) {
            debug!(
                provider = adapter.name(),
                slug = %slug,
                similarity,
                "Probing fuzzy listing match"
            );
            match self
                .probe_slug(adapter, catalog, &slug, FALLBACK_ACCEPT_CONFIDENCE)
                .await
            {
                Some(m) if m.confidence >= EARLY_STOP_CONFIDENCE => {
                    return ProbeOutcome::Accepted(m);
                }
                Some(m) => accepted.push(m),
                None => {}
            }
        }

        match take_best(&mut accepted) {
            Some(best) => ProbeOutcome::Accepted(best),
            None => ProbeOutcome::Unresolved,
        }
    }

    /// Fetch and score a single slug. Fetch errors skip the slug.
    async fn probe_slug(
        &self,
        adapter: &dyn ScraperAdapter,
        catalog: &CatalogRecord,
        slug: &str,
        threshold: f64,
    ) -> Option<AcceptedMatch> {
        let detail = match adapter.detail(slug).await {
            Ok(detail) => detail,
            Err(err) => {
                debug!(provider = adapter.name(), slug, %err, "Slug probe failed");
                return None;
            }
        };

        let outcome = score_candidate(catalog, &detail, slug);
        if outcome.is_match && outcome.confidence >= threshold {
            Some(AcceptedMatch {
                slug: slug.to_string(),
                confidence: outcome.confidence,
                detail,
            })
        } else {
            None
        }
    }

    async fn provider_listing(
        &self,
        adapter: &dyn ScraperAdapter,
    ) -> Option<Vec<crate::traits::ListingEntry>> {
        if let Some(cached) = self.listing_memo.get(adapter.name()) {
            return Some(cached);
        }
        match adapter.listing().await {
            Ok(entries) => {
                self.listing_memo.put(adapter.name(), entries.clone());
                Some(entries)
            }
            Err(err) => {
                warn!(provider = adapter.name(), %err, "Listing fetch failed");
                None
            }
        }
    }
}

fn take_best(accepted: &mut Vec<AcceptedMatch>) -> Option<AcceptedMatch> {
    accepted.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    if accepted.is_empty() {
        None
    } else {
        Some(accepted.remove(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::error::Error;
    use crate::models::{RawSource, TitleKind};
    use crate::store::MemorySlugMappingStore;
    use crate::traits::ListingEntry;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    /// Adapter serving a fixed slug -> detail table, recording probe order.
    struct FakeAdapter {
        titles: HashMap<String, ScrapedCandidate>,
        listing: Vec<ListingEntry>,
        probed: Mutex<Vec<String>>,
    }

    impl FakeAdapter {
        fn new(titles: Vec<ScrapedCandidate>, listing: Vec<&str>) -> Self {
            Self {
                titles: titles.into_iter().map(|t| (t.slug.clone(), t)).collect(),
                listing: listing
                    .into_iter()
                    .map(|s| ListingEntry {
                        slug: s.to_string(),
                        title: s.to_string(),
                    })
                    .collect(),
                probed: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ScraperAdapter for FakeAdapter {
        fn name(&self) -> &'static str {
            "samehadaku"
        }

        async fn listing(&self) -> Result<Vec<ListingEntry>> {
            Ok(self.listing.clone())
        }

        async fn detail(&self, slug: &str) -> Result<ScrapedCandidate> {
            self.probed.lock().push(slug.to_string());
            self.titles
                .get(slug)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("no title at {slug}")))
        }

        async fn episode_sources(&self, _slug: &str, _episode: u32) -> Result<Vec<RawSource>> {
            Ok(Vec::new())
        }

        fn episode_url(&self, slug: &str, episode: u32) -> String {
            format!("https://example.com/{slug}-episode-{episode}/")
        }
    }

    fn catalog(title: &str) -> CatalogRecord {
        CatalogRecord {
            id: 21,
            title: title.to_string(),
            title_english: None,
            title_japanese: None,
            title_synonyms: Vec::new(),
            kind: Some(TitleKind::Tv),
            year: Some(2023),
            season: None,
            studios: vec!["Studio Foo".to_string()],
            source: Some("Manga".to_string()),
            status: None,
            score: None,
            synopsis: None,
            genres: Vec::new(),
            cover_url: None,
        }
    }

    fn scraped(slug: &str, title: &str) -> ScrapedCandidate {
        ScrapedCandidate {
            provider: "samehadaku".to_string(),
            slug: slug.to_string(),
            title: title.to_string(),
            title_english: None,
            title_japanese: None,
            title_synonyms: Vec::new(),
            kind: "TV".to_string(),
            year: Some(2023),
            season: None,
            studio: Some("Studio Foo".to_string()),
            source: Some("Manga".to_string()),
            episodes: Vec::new(),
        }
    }

    fn resolver(adapter: Arc<FakeAdapter>) -> IdentityResolver {
        IdentityResolver::new(
            vec![adapter as Arc<dyn ScraperAdapter>],
            Arc::new(MemorySlugMappingStore::new()),
            Arc::new(ListingMemo::new(
                Arc::new(SystemClock),
                Duration::from_secs(300),
            )),
        )
    }

    #[tokio::test]
    async fn direct_slug_hit_resolves_and_persists() {
        let adapter = Arc::new(FakeAdapter::new(
            vec![scraped("example-title", "Example Title")],
            vec![],
        ));
        let resolver = resolver(adapter.clone());

        let resolution = resolver.resolve(&catalog("Example Title")).await.expect("resolve");
        assert_eq!(
            resolution.mapping.slug_for("samehadaku"),
            Some("example-title")
        );
        assert!(resolution.details.contains_key("samehadaku"));
    }

    #[tokio::test]
    async fn early_stop_skips_remaining_candidates() {
        // Perfect match on the first candidate; -s2 variants never probed.
        let adapter = Arc::new(FakeAdapter::new(
            vec![scraped("example-season-2", "Example Season 2")],
            vec![],
        ));
        let resolver = resolver(adapter.clone());

        resolver
            .resolve(&catalog("Example Season 2"))
            .await
            .expect("resolve");
        let probed = adapter.probed.lock().clone();
        assert_eq!(probed.first().map(String::as_str), Some("example-season-2"));
        assert_eq!(probed.len(), 1);
    }

    #[tokio::test]
    async fn fallback_probes_listing_when_variants_miss() {
        // The provider spells the slug in a way no variant generates.
        let adapter = Arc::new(FakeAdapter::new(
            vec![scraped("example-title-sub-indo", "Example Title")],
            vec!["example-title-sub-indo", "unrelated-show"],
        ));
        let resolver = resolver(adapter.clone());

        let resolution = resolver.resolve(&catalog("Example Title")).await.expect("resolve");
        assert_eq!(
            resolution.mapping.slug_for("samehadaku"),
            Some("example-title-sub-indo")
        );
    }

    #[tokio::test]
    async fn unresolved_persists_null_slug() {
        let adapter = Arc::new(FakeAdapter::new(vec![], vec!["totally-different"]));
        let mappings = Arc::new(MemorySlugMappingStore::new());
        let resolver = IdentityResolver::new(
            vec![adapter as Arc<dyn ScraperAdapter>],
            mappings.clone(),
            Arc::new(ListingMemo::new(
                Arc::new(SystemClock),
                Duration::from_secs(300),
            )),
        );

        let resolution = resolver.resolve(&catalog("Example Title")).await.expect("resolve");
        assert_eq!(resolution.mapping.slug_for("samehadaku"), None);

        let stored = mappings.get(21).await.expect("get").expect("row");
        assert!(stored.providers["samehadaku"].slug.is_none());
        assert!(stored.providers["samehadaku"].confidence.is_none());
    }
}
