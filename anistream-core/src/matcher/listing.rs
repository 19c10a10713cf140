//! Process-scoped memo of a provider's full listing.
//!
//! The fallback path of the resolver scans every live slug on a provider;
//! fetching that listing on every unresolved title would hammer the site.
//! The memo holds one read-mostly snapshot per provider, replaced
//! atomically, with expiry measured against an injected [`Clock`].

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::clock::SharedClock;
use crate::traits::ListingEntry;

struct Snapshot {
    entries: Vec<ListingEntry>,
    fetched_at: Instant,
}

pub struct ListingMemo {
    clock: SharedClock,
    ttl: Duration,
    snapshots: RwLock<HashMap<String, Snapshot>>,
}

impl ListingMemo {
    #[must_use]
    pub fn new(clock: SharedClock, ttl: Duration) -> Self {
        Self {
            clock,
            ttl,
            snapshots: RwLock::new(HashMap::new()),
        }
    }

    /// Return the cached listing for a provider if it is still fresh.
    #[must_use]
    pub fn get(&self, provider: &str) -> Option<Vec<ListingEntry>> {
        let snapshots = self.snapshots.read();
        let snapshot = snapshots.get(provider)?;
        if self.clock.now().duration_since(snapshot.fetched_at) < self.ttl {
            Some(snapshot.entries.clone())
        } else {
            None
        }
    }

    /// Replace the provider's snapshot. Last writer wins.
    pub fn put(&self, provider: &str, entries: Vec<ListingEntry>) {
        self.snapshots.write().insert(
            provider.to_string(),
            Snapshot {
                entries,
                fetched_at: self.clock.now(),
            },
        );
    }
}
