//! Unified catalog detail.
//!
//! Joins the canonical catalog record with every provider's view of the
//! same title: per-provider slugs and the merged episode list. This is the
//! one place identity resolution runs; a catalog id seen for the first
//! time gets its slug mapping built here, and every later request reuses
//! the persisted row.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::matcher::IdentityResolver;
use crate::models::{CatalogRecord, ProviderSlug, ScrapedCandidate};
use crate::traits::{CatalogClient, ScraperAdapter, SlugMappingStore};

/// One episode merged across providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeEntry {
    pub number: u32,
    pub title: Option<String>,
    /// Providers that list this episode, ascending by name.
    pub providers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogDetail {
    #[serde(flatten)]
    pub record: CatalogRecord,
    pub providers: HashMap<String, ProviderSlug>,
    pub episodes: Vec<EpisodeEntry>,
}

pub struct DetailService {
    catalog: Arc<dyn CatalogClient>,
    adapters: Vec<Arc<dyn ScraperAdapter>>,
    mappings: Arc<dyn SlugMappingStore>,
    resolver: Arc<IdentityResolver>,
}

impl DetailService {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn CatalogClient>,
        adapters: Vec<Arc<dyn ScraperAdapter>>,
        mappings: Arc<dyn SlugMappingStore>,
        resolver: Arc<IdentityResolver>,
    ) -> Self {
        Self {
            catalog,
            adapters,
            mappings,
            resolver,
        }
    }

    pub async fn catalog_detail(&self, catalog_id: u32) -> Result<CatalogDetail> {
        let record = self.catalog.by_id(catalog_id).await?;

        let (providers, details) = match self.mappings.get(catalog_id).await? {
            Some(mapping) => {
                debug!(catalog_id, "Reusing persisted slug mapping");
                let details = self.fetch_details(&mapping.providers).await;
                (mapping.providers, details)
            }
            None => {
                let resolution = self.resolver.resolve(&record).await?;
                (resolution.mapping.providers, resolution.details)
            }
        };

        let episodes = merge_episodes(&details);
        Ok(CatalogDetail {
            record,
            providers,
            episodes,
        })
    }

    /// Fetch provider details for every resolved slug; failed providers
    /// simply drop out of the merge.
    async fn fetch_details(
        &self,
        providers: &HashMap<String, ProviderSlug>,
    ) -> HashMap<String, ScrapedCandidate> {
        let fetches = self.adapters.iter().filter_map(|adapter| {
            let slug = providers.get(adapter.name())?.slug.clone()?;
            Some(async move {
                let name = adapter.name();
                match adapter.detail(&slug).await {
                    Ok(detail) => Some((name.to_string(), detail)),
                    Err(err) => {
                        warn!(provider = name, %slug, %err, "Detail fetch failed");
                        None
                    }
                }
            })
        });
        join_all(fetches).await.into_iter().flatten().collect()
    }
}

/// Merge episode lists across providers: keyed by episode number, first
/// non-empty title wins, providers listed ascending.
fn merge_episodes(details: &HashMap<String, ScrapedCandidate>) -> Vec<EpisodeEntry> {
    let mut merged: BTreeMap<u32, EpisodeEntry> = BTreeMap::new();
    let mut names: Vec<&String> = details.keys().collect();
    names.sort();
    for name in names {
        let detail = &details[name];
        for episode in &detail.episodes {
            let entry = merged.entry(episode.number).or_insert_with(|| EpisodeEntry {
                number: episode.number,
                title: None,
                providers: Vec::new(),
            });
            if entry.title.is_none() {
                entry.title = episode.title.clone().filter(|t| !t.is_empty());
            }
            entry.providers.push(name.clone());
        }
    }
    merged.into_values().collect()
}
