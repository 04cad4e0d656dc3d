//! Hand-written collaborator mocks shared by the orchestrator and app tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::cache::{CacheBudget, DiskTier, MemoryTier, TieredCache};
use crate::data::{CitySearchResult, GeoFix, IconOrigin, WeatherService, WeatherSnapshot};
use crate::error::ApiError;
use crate::location::{AcquisitionAttempt, LocationAcquirer, LocationStrategy, PermissionFlag};
use crate::orchestrator::{Collaborators, OrchestratorSettings, RequestOrchestrator};
use crate::prefs::{LastTarget, PreferenceStore};

pub const ICON_BYTES: &[u8] = b"\x89PNG fake icon";

pub fn snapshot(city: &str, icon_code: &str) -> WeatherSnapshot {
    WeatherSnapshot {
        city_name: city.to_string(),
        country: "US".to_string(),
        temperature: 21.5,
        feels_like: 20.0,
        temp_min: 18.0,
        temp_max: 24.0,
        humidity: 60,
        pressure: 1013,
        wind_speed: 3.5,
        condition: "Clouds".to_string(),
        description: "scattered clouds".to_string(),
        icon_code: icon_code.to_string(),
        visibility: 10_000,
        cloudiness: 40,
        sunrise: None,
        sunset: None,
        location: GeoFix::new(40.71, -74.01),
        fetched_at: Utc::now(),
    }
}

pub fn new_york() -> CitySearchResult {
    city_result("New York", "NY", 40.71, -74.01)
}

pub fn city_result(name: &str, state: &str, latitude: f64, longitude: f64) -> CitySearchResult {
    CitySearchResult {
        name: name.to_string(),
        state: Some(state.to_string()),
        country: "US".to_string(),
        latitude,
        longitude,
    }
}

/// Weather collaborator with canned answers that records every call
#[derive(Default)]
pub struct MockWeather {
    cities: Mutex<HashMap<String, WeatherSnapshot>>,
    city_delays: Mutex<HashMap<String, Duration>>,
    searches: Mutex<HashMap<String, Vec<CitySearchResult>>>,
    search_delays: Mutex<HashMap<String, Duration>>,
    by_coordinates: Mutex<Option<WeatherSnapshot>>,
    fail_status: Mutex<Option<u16>>,
    pub city_calls: Mutex<Vec<(String, Option<String>)>>,
    pub search_calls: Mutex<Vec<String>>,
    pub coordinate_calls: Mutex<Vec<(f64, f64)>>,
}

impl MockWeather {
    pub fn with_city(self, snapshot: WeatherSnapshot) -> Self {
        self.cities
            .lock()
            .insert(snapshot.city_name.to_lowercase(), snapshot);
        self
    }

    /// Makes `fetch_by_city(name)` take `delay` before answering.
    pub fn with_city_delay(self, name: &str, delay: Duration) -> Self {
        self.city_delays.lock().insert(name.to_lowercase(), delay);
        self
    }

    pub fn with_search(self, query: &str, results: Vec<CitySearchResult>) -> Self {
        self.searches.lock().insert(query.to_string(), results);
        self
    }

    /// Makes `search_cities(query)` take `delay` before answering.
    pub fn with_search_delay(self, query: &str, delay: Duration) -> Self {
        self.search_delays.lock().insert(query.to_string(), delay);
        self
    }

    pub fn with_coordinates(self, snapshot: WeatherSnapshot) -> Self {
        *self.by_coordinates.lock() = Some(snapshot);
        self
    }

    /// Every call fails with this HTTP status.
    pub fn failing_with(self, status: u16) -> Self {
        *self.fail_status.lock() = Some(status);
        self
    }

    fn check_failure(&self) -> Result<(), ApiError> {
        match *self.fail_status.lock() {
            Some(status) => Err(ApiError::Http {
                status,
                message: "mock failure".to_string(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl WeatherService for MockWeather {
    async fn fetch_by_coordinates(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<WeatherSnapshot, ApiError> {
        self.coordinate_calls.lock().push((latitude, longitude));
        self.check_failure()?;
        self.by_coordinates.lock().clone().ok_or(ApiError::Http {
            status: 500,
            message: "no coordinate answer".to_string(),
        })
    }

    async fn fetch_by_city(
        &self,
        name: &str,
        state: Option<&str>,
        _country: &str,
    ) -> Result<WeatherSnapshot, ApiError> {
        self.city_calls
            .lock()
            .push((name.to_string(), state.map(str::to_string)));
        let delay = self.city_delays.lock().get(&name.to_lowercase()).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_failure()?;
        self.cities
            .lock()
            .get(&name.to_lowercase())
            .cloned()
            .ok_or(ApiError::CityNotFound)
    }

    async fn search_cities(
        &self,
        query: &str,
        _country: &str,
        limit: usize,
    ) -> Result<Vec<CitySearchResult>, ApiError> {
        self.search_calls.lock().push(query.to_string());
        let delay = self.search_delays.lock().get(query).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_failure()?;
        let mut results = self.searches.lock().get(query).cloned().unwrap_or_default();
        results.truncate(limit);
        Ok(results)
    }
}

/// Icon origin that counts fetches
#[derive(Default)]
pub struct MockIcons {
    pub fetches: AtomicUsize,
    fail: bool,
}

impl MockIcons {
    pub fn failing() -> Self {
        Self {
            fetches: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IconOrigin for MockIcons {
    async fn fetch_icon(&self, _icon_code: &str) -> Result<Vec<u8>, ApiError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(ApiError::Http {
                status: 404,
                message: "Not Found".to_string(),
            })
        } else {
            Ok(ICON_BYTES.to_vec())
        }
    }
}

/// In-memory preference store
#[derive(Default)]
pub struct MemoryPrefs {
    pub target: Mutex<Option<LastTarget>>,
    read_delay: Option<Duration>,
}

impl MemoryPrefs {
    pub fn saved(city: &str, state: Option<&str>) -> Self {
        Self {
            target: Mutex::new(Some(LastTarget {
                city: city.to_string(),
                state: state.map(str::to_string),
            })),
            read_delay: None,
        }
    }

    /// Makes `read_last_target` take `delay` before answering.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }
}

#[async_trait]
impl PreferenceStore for MemoryPrefs {
    async fn read_last_target(&self) -> Option<LastTarget> {
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        self.target.lock().clone()
    }

    async fn write_last_target(&self, city: &str, state: Option<&str>) {
        *self.target.lock() = Some(LastTarget {
            city: city.to_string(),
            state: state.map(str::to_string),
        });
    }

    async fn clear_last_target(&self) {
        *self.target.lock() = None;
    }
}

/// Location strategy with a fixed answer
pub struct FixedStrategy {
    fix: Option<GeoFix>,
    pub attempts: Arc<AtomicUsize>,
}

#[async_trait]
impl LocationStrategy for FixedStrategy {
    fn kind(&self) -> AcquisitionAttempt {
        AcquisitionAttempt::HighAccuracyOneShot
    }

    async fn attempt(&self, _timeout: Duration, _cancel: CancellationToken) -> Option<GeoFix> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.fix
    }
}

/// An orchestrator wired to mocks, plus handles to inspect them
pub struct Harness {
    pub orchestrator: RequestOrchestrator,
    pub weather: Arc<MockWeather>,
    pub icons: Arc<MockIcons>,
    pub prefs: Arc<MemoryPrefs>,
    pub permission: PermissionFlag,
    pub location_attempts: Arc<AtomicUsize>,
    _temp_dir: TempDir,
}

/// Builder for [`Harness`]
pub struct HarnessBuilder {
    weather: MockWeather,
    icons: MockIcons,
    prefs: MemoryPrefs,
    fix: Option<GeoFix>,
    granted: bool,
}

impl HarnessBuilder {
    pub fn new(weather: MockWeather) -> Self {
        Self {
            weather,
            icons: MockIcons::default(),
            prefs: MemoryPrefs::default(),
            fix: None,
            granted: false,
        }
    }

    pub fn icons(mut self, icons: MockIcons) -> Self {
        self.icons = icons;
        self
    }

    pub fn prefs(mut self, prefs: MemoryPrefs) -> Self {
        self.prefs = prefs;
        self
    }

    /// Every location strategy attempt yields `fix`.
    pub fn location(mut self, fix: Option<GeoFix>) -> Self {
        self.fix = fix;
        self
    }

    pub fn permission(mut self, granted: bool) -> Self {
        self.granted = granted;
        self
    }

    pub fn build(self) -> Harness {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let cache = TieredCache::new(
            MemoryTier::new(CacheBudget::with_capacity(1024 * 1024)),
            DiskTier::new(temp_dir.path().join("icons"), CacheBudget::with_capacity(1024 * 1024)),
        );

        let attempts = Arc::new(AtomicUsize::new(0));
        let permission = PermissionFlag::new(self.granted);
        let strategies: Vec<Box<dyn LocationStrategy>> = (0..3)
            .map(|_| {
                Box::new(FixedStrategy {
                    fix: self.fix,
                    attempts: Arc::clone(&attempts),
                }) as Box<dyn LocationStrategy>
            })
            .collect();
        let acquirer = LocationAcquirer::with_strategies(
            strategies,
            permission.clone(),
            Duration::from_secs(1),
        );

        let weather = Arc::new(self.weather);
        let icons = Arc::new(self.icons);
        let prefs = Arc::new(self.prefs);
        let collaborators = Collaborators {
            weather: weather.clone(),
            icons: icons.clone(),
            prefs: prefs.clone(),
        };
        let orchestrator = RequestOrchestrator::new(
            collaborators,
            cache,
            Arc::new(acquirer),
            OrchestratorSettings::default(),
        );

        Harness {
            orchestrator,
            weather,
            icons,
            prefs,
            permission,
            location_attempts: attempts,
            _temp_dir: temp_dir,
        }
    }
}

/// Lets every spawned task run to completion under a paused clock.
pub async fn settle() {
    tokio::time::sleep(Duration::from_secs(5)).await;
}
