//! Persisted user preferences
//!
//! Remembers the last city the user looked at so the next launch can open on
//! it. Stored as a small JSON file next to the rest of the application data.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// The last successfully loaded weather target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastTarget {
    pub city: String,
    pub state: Option<String>,
}

/// Storage for [`LastTarget`]. Failures are absorbed: reads yield `None`,
/// writes are best-effort.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn read_last_target(&self) -> Option<LastTarget>;

    async fn write_last_target(&self, city: &str, state: Option<&str>);

    async fn clear_last_target(&self);
}

/// On-disk layout of the preferences file
#[derive(Debug, Default, Serialize, Deserialize)]
struct PrefsFile {
    #[serde(default)]
    last_city: Option<String>,
    #[serde(default)]
    last_state: Option<String>,
}

/// JSON-file backed [`PreferenceStore`]
#[derive(Debug, Clone)]
pub struct FilePreferences {
    path: PathBuf,
}

impl FilePreferences {
    /// Creates a store that reads and writes `path`
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Option<PrefsFile> {
        let content = tokio::fs::read_to_string(&self.path).await.ok()?;
        match serde_json::from_str(&content) {
            Ok(prefs) => Some(prefs),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Ignoring unreadable preferences file"
                );
                None
            }
        }
    }

    async fn store(&self, prefs: &PrefsFile) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(prefs)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        tokio::fs::write(&self.path, json).await
    }
}

#[async_trait]
impl PreferenceStore for FilePreferences {
    async fn read_last_target(&self) -> Option<LastTarget> {
        let prefs = self.load().await?;
        let city = prefs.last_city.filter(|c| !c.trim().is_empty())?;
        Some(LastTarget {
            city,
            state: prefs.last_state.filter(|s| !s.trim().is_empty()),
        })
    }

    async fn write_last_target(&self, city: &str, state: Option<&str>) {
        let prefs = PrefsFile {
            last_city: Some(city.to_string()),
            last_state: state.map(str::to_string),
        };
        if let Err(e) = self.store(&prefs).await {
            warn!(path = %self.path.display(), error = %e, "Failed to save preferences");
        }
    }

    async fn clear_last_target(&self) {
        if let Err(e) = self.store(&PrefsFile::default()).await {
            warn!(path = %self.path.display(), error = %e, "Failed to clear preferences");
        }
    }
}
