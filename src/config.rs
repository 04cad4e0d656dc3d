//! Runtime configuration
//!
//! Collects the API key, on-disk locations, cache budgets, and timings in one
//! place. Everything has a default; the API key comes from the environment and
//! directories come from the platform's conventions.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;

use crate::cache::{CacheBudget, DEFAULT_LOW_WATER_RATIO};
use crate::orchestrator::OrchestratorSettings;

/// Environment variable holding the OpenWeatherMap API key
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

/// Nominal process memory the in-memory icon tier takes a share of
const NOMINAL_PROCESS_MEMORY: u64 = 64 * 1024 * 1024;

/// Share of nominal process memory given to the in-memory icon tier
const MEMORY_TIER_DIVISOR: u64 = 8;

/// Disk budget for cached icons
const DISK_BUDGET_BYTES: u64 = 10 * 1024 * 1024;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// OpenWeatherMap API key; empty when not configured
    pub api_key: String,
    /// Root of cached data (icons, logs)
    pub cache_dir: PathBuf,
    /// Where preferences are stored
    pub data_dir: PathBuf,
    pub memory_budget_bytes: u64,
    pub disk_budget_bytes: u64,
    pub low_water_ratio: f64,
    pub search_debounce: Duration,
    pub min_query_len: usize,
    pub search_limit: usize,
    /// ISO country code for city lookups
    pub country: String,
    /// Bound on each location strategy
    pub location_timeout: Duration,
    /// Interval requested by the single-update location strategy
    pub single_update_interval: Duration,
    /// Connect and read timeout for HTTP requests
    pub http_timeout: Duration,
}

impl Config {
    /// Creates a Config rooted at the given directories, with every other
    /// setting at its default
    pub fn with_dirs(cache_dir: PathBuf, data_dir: PathBuf) -> Self {
        Self {
            api_key: String::new(),
            cache_dir,
            data_dir,
            memory_budget_bytes: NOMINAL_PROCESS_MEMORY / MEMORY_TIER_DIVISOR,
            disk_budget_bytes: DISK_BUDGET_BYTES,
            low_water_ratio: DEFAULT_LOW_WATER_RATIO,
            search_debounce: Duration::from_millis(300),
            min_query_len: 2,
            search_limit: 5,
            country: "US".to_string(),
            location_timeout: Duration::from_secs(10),
            single_update_interval: Duration::from_secs(1),
            http_timeout: Duration::from_secs(10),
        }
    }

    /// Builds the configuration from platform directories and the environment.
    ///
    /// Uses `~/.cache/nimbus/` and `~/.local/share/nimbus/` on Linux, or the
    /// platform equivalents. Returns `None` if no home directory can be found.
    /// A missing API key is not an error; requests will fail as unauthorized.
    pub fn from_env() -> Option<Self> {
        let dirs = ProjectDirs::from("", "", "nimbus")?;
        let mut config =
            Self::with_dirs(dirs.cache_dir().to_path_buf(), dirs.data_dir().to_path_buf());
        config.api_key = std::env::var(API_KEY_ENV).unwrap_or_default();
        Some(config)
    }

    /// Moves the cache root, leaving preferences where they are
    pub fn with_cache_dir(mut self, cache_dir: impl AsRef<Path>) -> Self {
        self.cache_dir = cache_dir.as_ref().to_path_buf();
        self
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Directory owned by the on-disk icon tier
    pub fn icon_dir(&self) -> PathBuf {
        self.cache_dir.join("weather_icons")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.cache_dir.join("logs")
    }

    pub fn prefs_path(&self) -> PathBuf {
        self.data_dir.join("preferences.json")
    }

    pub fn memory_budget(&self) -> CacheBudget {
        CacheBudget::new(self.memory_budget_bytes, self.low_water_ratio)
    }

    pub fn disk_budget(&self) -> CacheBudget {
        CacheBudget::new(self.disk_budget_bytes, self.low_water_ratio)
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            debounce: self.search_debounce,
            min_query_len: self.min_query_len,
            search_limit: self.search_limit,
            country: self.country.clone(),
        }
    }
}
