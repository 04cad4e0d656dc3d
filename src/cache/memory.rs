//! In-memory tier with least-recently-used eviction.
//!
//! The tier is bounded by a byte budget. Every `get` hit marks the entry as
//! most recently used; when an insert would push the resident size over
//! capacity, the least recently used entries are dropped first, down to the
//! budget's low-water mark or whatever lower level leaves room for the new
//! entry.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;
use tracing::debug;

use super::types::{Asset, CacheBudget, CacheKey};

/// A resident entry and its position in the recency order.
#[derive(Debug)]
struct Entry {
    asset: Asset,
    /// Logical access time; larger is more recent
    stamp: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<CacheKey, Entry>,
    /// Recency index: access stamp -> key, oldest first
    recency: BTreeMap<u64, CacheKey>,
    clock: u64,
    used_bytes: u64,
}

impl Inner {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn touch(&mut self, key: &CacheKey) -> Option<Asset> {
        let stamp = self.tick();
        let entry = self.entries.get_mut(key)?;
        self.recency.remove(&entry.stamp);
        entry.stamp = stamp;
        self.recency.insert(stamp, key.clone());
        Some(entry.asset.clone())
    }

    fn evict_oldest(&mut self) -> Option<(CacheKey, u64)> {
        let (_, key) = self.recency.pop_first()?;
        let entry = self.entries.remove(&key)?;
        let size = entry.asset.size_bytes();
        self.used_bytes -= size;
        Some((key, size))
    }
}

/// Volatile, process-local asset tier.
#[derive(Debug)]
pub struct MemoryTier {
    budget: CacheBudget,
    inner: Mutex<Inner>,
}

impl MemoryTier {
    pub fn new(budget: CacheBudget) -> Self {
        Self {
            budget,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Returns the asset for `key` and marks it most recently used.
    pub fn get(&self, key: &CacheKey) -> Option<Asset> {
        self.inner.lock().touch(key)
    }

    /// Inserts `asset` under `key` unless the key is already resident.
    ///
    /// An existing entry is kept as-is (first writer wins) and its recency is
    /// not refreshed. Assets larger than the whole capacity are not admitted.
    pub fn put(&self, key: CacheKey, asset: Asset) {
        let size = asset.size_bytes();
        let capacity = self.budget.capacity_bytes;
        if size > capacity {
            debug!(key = %key, size, capacity, "Asset exceeds memory tier capacity, not cached");
            return;
        }

        let mut inner = self.inner.lock();
        if inner.entries.contains_key(&key) {
            return;
        }

        // Trim the resident entries before inserting so the new one survives.
        if inner.used_bytes + size > capacity {
            let goal = self.budget.low_water_mark().min(capacity - size);
            while inner.used_bytes > goal {
                match inner.evict_oldest() {
                    Some((evicted, bytes)) => {
                        debug!(key = %evicted, bytes, "Evicted from memory tier");
                    }
                    None => break,
                }
            }
        }

        let stamp = inner.tick();
        inner.recency.insert(stamp, key.clone());
        inner.entries.insert(key, Entry { asset, stamp });
        inner.used_bytes += size;
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.inner.lock().entries.contains_key(key)
    }

    /// Drops every entry. Used on memory pressure or explicit invalidation.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let dropped = inner.entries.len();
        inner.entries.clear();
        inner.recency.clear();
        inner.used_bytes = 0;
        debug!(entries = dropped, "Cleared memory tier");
    }

    pub fn used_bytes(&self) -> u64 {
        self.inner.lock().used_bytes
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn budget(&self) -> CacheBudget {
        self.budget
    }
}
