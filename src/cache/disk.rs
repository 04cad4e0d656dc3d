//! Persistent on-disk tier
//!
//! Stores each asset as a single file in a dedicated directory. File names are
//! the SHA-256 of the logical key, so arbitrary keys map to safe, fixed-length
//! names. The file modification time doubles as the LRU signal: reads refresh
//! it, and eviction removes the oldest files first.
//!
//! All failures are absorbed here. A cache that cannot be read behaves like an
//! empty cache and a write that fails is dropped, so callers never see I/O
//! errors from this tier.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::types::{Asset, CacheBudget, CacheKey};

/// Extension used for cached asset files.
const ENTRY_EXTENSION: &str = "icon";

/// Outcome of a trim pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionResult {
    /// Number of files deleted
    pub files_deleted: usize,
    /// Total bytes freed
    pub bytes_freed: u64,
    /// Resident size before eviction
    pub size_before: u64,
    /// Resident size after eviction
    pub size_after: u64,
}

/// A file found while scanning the cache directory.
#[derive(Debug)]
struct StoredFile {
    path: PathBuf,
    size: u64,
    modified: SystemTime,
}

/// Bounded, content-addressed asset store on the local filesystem.
///
/// The directory is owned by this tier; nothing else should write into it.
/// A process-local mutex serializes reads, writes, and trims.
#[derive(Debug)]
pub struct DiskTier {
    dir: PathBuf,
    budget: CacheBudget,
    lock: Mutex<()>,
}

impl DiskTier {
    /// Creates a tier rooted at `dir`. The directory is created lazily on the
    /// first write.
    pub fn new(dir: impl Into<PathBuf>, budget: CacheBudget) -> Self {
        Self {
            dir: dir.into(),
            budget,
            lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn budget(&self) -> CacheBudget {
        self.budget
    }

    /// Returns the file backing `key`.
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.{}", hash_key(key), ENTRY_EXTENSION))
    }

    /// Reads the asset stored under `key`, refreshing its modification time.
    ///
    /// Missing, unreadable, or undecodable files all read as `None`.
    pub fn get(&self, key: &CacheKey) -> Option<Asset> {
        let _guard = self.lock.lock();
        let path = self.path_for(key);
        if !path.is_file() {
            return None;
        }

        if let Err(e) = touch(&path) {
            debug!(key = %key, error = %e, "Failed to refresh cache entry mtime");
        }

        match fs::read(&path) {
            Ok(bytes) => {
                let asset = Asset::decode(bytes);
                if asset.is_none() {
                    debug!(
                        key = %key,
                        path = %path.display(),
                        "Discarding undecodable cache entry"
                    );
                }
                asset
            }
            Err(e) => {
                debug!(key = %key, error = %e, "Failed to read cache entry");
                None
            }
        }
    }

    /// Stores `asset` under `key`, trimming old entries first if the write
    /// would push the tier over capacity. Failures are logged and dropped.
    pub fn put(&self, key: &CacheKey, asset: &Asset) {
        let _guard = self.lock.lock();
        if let Err(e) = self.try_put(key, asset) {
            warn!(key = %key, error = %e, "Disk cache write failed");
        }
    }

    fn try_put(&self, key: &CacheKey, asset: &Asset) -> io::Result<()> {
        let incoming = asset.size_bytes();
        if incoming > self.budget.capacity_bytes {
            debug!(key = %key, size = incoming, "Asset exceeds disk tier capacity, not cached");
            return Ok(());
        }

        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);

        if let Some(result) = self.trim_for(&path, incoming)? {
            info!(
                files_deleted = result.files_deleted,
                bytes_freed = result.bytes_freed,
                size_before = result.size_before,
                size_after = result.size_after,
                "Disk cache trimmed"
            );
        }

        fs::write(&path, asset.as_bytes())
    }

    /// Evicts the oldest files if writing `incoming` bytes to `target` would
    /// exceed capacity.
    ///
    /// Eviction continues until the remaining files are at or below the
    /// low-water mark and leave room for the incoming entry. A file already at
    /// `target` is about to be replaced, so it is not counted.
    fn trim_for(&self, target: &Path, incoming: u64) -> io::Result<Option<EvictionResult>> {
        let mut files: Vec<StoredFile> = scan(&self.dir)?
            .into_iter()
            .filter(|file| file.path != target)
            .collect();
        let size_before: u64 = files.iter().map(|f| f.size).sum();

        if size_before + incoming <= self.budget.capacity_bytes {
            return Ok(None);
        }

        let goal = self
            .budget
            .low_water_mark()
            .min(self.budget.capacity_bytes - incoming);

        files.sort_by_key(|file| file.modified);

        let mut result = EvictionResult {
            size_before,
            size_after: size_before,
            ..Default::default()
        };

        for file in files {
            if result.size_after <= goal {
                break;
            }
            match fs::remove_file(&file.path) {
                Ok(()) => {
                    result.files_deleted += 1;
                    result.bytes_freed += file.size;
                    result.size_after -= file.size;
                }
                Err(e) => {
                    debug!(path = %file.path.display(), error = %e, "Failed to evict cache file");
                }
            }
        }

        Ok(Some(result))
    }

    /// Deletes every entry in the tier.
    pub fn clear(&self) {
        let _guard = self.lock.lock();
        match scan(&self.dir) {
            Ok(files) => {
                let count = files.len();
                for file in files {
                    if let Err(e) = fs::remove_file(&file.path) {
                        debug!(
                            path = %file.path.display(),
                            error = %e,
                            "Failed to remove cache file"
                        );
                    }
                }
                info!(files = count, "Cleared disk cache");
            }
            Err(e) => debug!(error = %e, "Disk cache directory not readable, nothing to clear"),
        }
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.path_for(key).is_file()
    }

    /// Current resident size in bytes. Unreadable directories count as empty.
    pub fn used_bytes(&self) -> u64 {
        let _guard = self.lock.lock();
        scan(&self.dir)
            .map(|files| files.iter().map(|f| f.size).sum())
            .unwrap_or(0)
    }
}

/// Maps a logical key to a fixed-length, filesystem-safe name.
fn hash_key(key: &CacheKey) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_str().as_bytes());
    hex::encode(hasher.finalize())
}

fn touch(path: &Path) -> io::Result<()> {
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_modified(SystemTime::now())
}

/// Lists the cache entries in `dir`. A missing directory is an empty cache.
fn scan(dir: &Path) -> io::Result<Vec<StoredFile>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut files = Vec::new();
    for entry in entries.flatten() {
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        files.push(StoredFile {
            path: entry.path(),
            size: metadata.len(),
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        });
    }
    Ok(files)
}

/// Sets the modification time of a cache file. Used by tests to build a
/// deterministic age ordering.
#[cfg(test)]
fn set_mtime(path: &Path, time: SystemTime) {
    let file: fs::File = OpenOptions::new()
        .write(true)
        .open(path)
        .expect("cache file should exist");
    file.set_modified(time).expect("set mtime");
}
