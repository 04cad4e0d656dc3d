//! Two-level asset cache: memory (fast) over disk (persistent).

use std::sync::Arc;

use tracing::{debug, warn};

use super::disk::DiskTier;
use super::memory::MemoryTier;
use super::types::{Asset, CacheKey};

/// Read-through, write-through composition of [`MemoryTier`] over [`DiskTier`].
///
/// Disk access runs on Tokio's blocking pool so callers on the interactive
/// context never wait on the filesystem directly. Cloning shares the tiers.
#[derive(Debug, Clone)]
pub struct TieredCache {
    memory: Arc<MemoryTier>,
    disk: Arc<DiskTier>,
}

impl TieredCache {
    pub fn new(memory: MemoryTier, disk: DiskTier) -> Self {
        Self {
            memory: Arc::new(memory),
            disk: Arc::new(disk),
        }
    }

    /// Looks `key` up in memory, then on disk.
    ///
    /// A disk hit is promoted into the memory tier before it is returned. A
    /// miss in both tiers returns `None`; fetching from the origin is the
    /// caller's job.
    pub async fn get(&self, key: &CacheKey) -> Option<Asset> {
        if let Some(asset) = self.memory.get(key) {
            debug!(key = %key, "Memory cache hit");
            return Some(asset);
        }

        let disk = Arc::clone(&self.disk);
        let lookup = key.clone();
        let found = match tokio::task::spawn_blocking(move || disk.get(&lookup)).await {
            Ok(found) => found,
            Err(e) => {
                warn!(key = %key, error = %e, "Disk cache lookup task failed");
                None
            }
        };

        match found {
            Some(asset) => {
                debug!(key = %key, "Disk cache hit, promoting to memory");
                self.memory.put(key.clone(), asset.clone());
                Some(asset)
            }
            None => {
                debug!(key = %key, "Cache miss");
                None
            }
        }
    }

    /// Writes `asset` to both tiers, each applying its own admission and
    /// eviction rules.
    pub async fn put(&self, key: CacheKey, asset: Asset) {
        self.memory.put(key.clone(), asset.clone());

        let disk = Arc::clone(&self.disk);
        if let Err(e) = tokio::task::spawn_blocking(move || disk.put(&key, &asset)).await {
            warn!(error = %e, "Disk cache write task failed");
        }
    }

    /// Drops the memory tier only. Cheap; intended for memory pressure.
    pub fn clear_volatile(&self) {
        self.memory.clear();
    }

    /// Drops both tiers.
    pub async fn clear_all(&self) {
        self.memory.clear();
        let disk = Arc::clone(&self.disk);
        if let Err(e) = tokio::task::spawn_blocking(move || disk.clear()).await {
            warn!(error = %e, "Disk cache clear task failed");
        }
    }

    pub fn memory(&self) -> &MemoryTier {
        &self.memory
    }

    pub fn disk(&self) -> &DiskTier {
        &self.disk
    }
}
