//! Shared cache vocabulary: keys, payloads, and byte budgets.

use std::fmt;
use std::sync::Arc;

/// Fraction of capacity a tier trims down to once it overflows.
pub const DEFAULT_LOW_WATER_RATIO: f64 = 0.8;

/// Logical identifier for a cached asset.
///
/// Keys are opaque strings; the icon helper namespaces icon codes so that
/// other asset classes could share a tier without colliding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key for a weather icon code such as `"10d"`.
    pub fn icon(code: &str) -> Self {
        Self(format!("weather_icon_{}", code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for CacheKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// An immutable binary asset held by the cache.
///
/// Cloning is cheap: the bytes are reference counted, so handing an asset to
/// the UI never copies the payload.
#[derive(Clone, PartialEq, Eq)]
pub struct Asset(Arc<[u8]>);

impl Asset {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Arc::from(bytes.into()))
    }

    /// Decodes raw bytes read from storage or the network.
    ///
    /// Returns `None` for payloads that cannot be a valid asset (currently an
    /// empty body), which callers treat the same as a cache miss.
    pub fn decode(bytes: Vec<u8>) -> Option<Self> {
        if bytes.is_empty() {
            return None;
        }
        Some(Self::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Size charged against a tier's budget.
    pub fn size_bytes(&self) -> u64 {
        self.0.len() as u64
    }
}

impl fmt::Debug for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Asset({} bytes)", self.0.len())
    }
}

impl From<Vec<u8>> for Asset {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for Asset {
    fn from(bytes: &[u8]) -> Self {
        Self(Arc::from(bytes))
    }
}

/// Byte budget for a single tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheBudget {
    /// Hard limit on resident bytes
    pub capacity_bytes: u64,
    /// Fraction of `capacity_bytes` to trim down to once the limit is exceeded
    pub low_water_ratio: f64,
}

impl CacheBudget {
    pub fn new(capacity_bytes: u64, low_water_ratio: f64) -> Self {
        Self {
            capacity_bytes,
            low_water_ratio: low_water_ratio.clamp(0.0, 1.0),
        }
    }

    /// Budget that trims to the default 80% low-water mark.
    pub fn with_capacity(capacity_bytes: u64) -> Self {
        Self::new(capacity_bytes, DEFAULT_LOW_WATER_RATIO)
    }

    /// Resident size eviction aims for after an overflow.
    pub fn low_water_mark(&self) -> u64 {
        (self.capacity_bytes as f64 * self.low_water_ratio) as u64
    }
}
