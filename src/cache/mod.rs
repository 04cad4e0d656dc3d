//! Cache module for weather icon assets
//!
//! Icons are held in two tiers: a bounded in-memory LRU for fast repeat
//! lookups, and a bounded on-disk store that survives restarts. The
//! [`TieredCache`] composes them with read-through promotion and write-through
//! population. Every failure inside the cache degrades to a miss.

mod disk;
mod memory;
mod tiered;
mod types;

pub use disk::{DiskTier, EvictionResult};
pub use memory::MemoryTier;
pub use tiered::TieredCache;
pub use types::{Asset, CacheBudget, CacheKey, DEFAULT_LOW_WATER_RATIO};
