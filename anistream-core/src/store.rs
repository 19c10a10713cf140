//! In-memory collaborator implementations.
//!
//! Durable caches normally live outside the process; these moka-backed
//! versions implement the same contracts for single-node deployments and
//! tests. Expiry is enforced on read, so an expired entry is never
//! returned even before moka evicts it.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::models::{ArchivedVideo, SlugMapping};
use crate::traits::{CacheStore, SlugMappingStore, StorageLedger};

pub struct MemoryCacheStore {
    entries: moka::future::Cache<String, (serde_json::Value, Instant)>,
}

impl MemoryCacheStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: moka::future::Cache::builder()
                .max_capacity(100_000)
                .build(),
        }
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        match self.entries.get(key).await {
            Some((value, expires_at)) if expires_at > Instant::now() => Ok(Some(value)),
            Some(_) => {
                self.entries.invalidate(key).await;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: serde_json::Value, ttl: Duration) -> Result<()> {
        self.entries
            .insert(key.to_string(), (value, Instant::now() + ttl))
            .await;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemorySlugMappingStore {
    rows: RwLock<HashMap<u32, SlugMapping>>,
}

impl MemorySlugMappingStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SlugMappingStore for MemorySlugMappingStore {
    async fn get(&self, catalog_id: u32) -> Result<Option<SlugMapping>> {
        Ok(self.rows.read().get(&catalog_id).cloned())
    }

    async fn upsert(&self, mut mapping: SlugMapping) -> Result<()> {
        let mut rows = self.rows.write();
        if let Some(existing) = rows.get(&mapping.catalog_id) {
            mapping.created_at = existing.created_at;
        }
        mapping.updated_at = Utc::now();
        rows.insert(mapping.catalog_id, mapping);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStorageLedger {
    rows: RwLock<Vec<ArchivedVideo>>,
}

impl MemoryStorageLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageLedger for MemoryStorageLedger {
    async fn query(&self, catalog_id: u32, episode: u32) -> Result<Vec<ArchivedVideo>> {
        Ok(self
            .rows
            .read()
            .iter()
            .filter(|v| v.catalog_id == catalog_id && v.episode == episode)
            .cloned()
            .collect())
    }

    async fn append(&self, entry: ArchivedVideo) -> Result<()> {
        self.rows.write().push(entry);
        Ok(())
    }
}
