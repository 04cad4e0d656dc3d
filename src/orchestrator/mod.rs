//! Request orchestration
//!
//! [`RequestOrchestrator`] owns the two user-facing state machines, weather
//! and city search, and publishes them over `watch` channels. Calls on the
//! orchestrator return immediately; the work runs on spawned tasks and
//! reports back through the channels.
//!
//! Starting a weather load supersedes any load in flight, and every keystroke
//! supersedes the pending search. A superseded task is cancelled and can no
//! longer publish: state is only written while holding the kind's [`Slot`]
//! lock, after checking that the task's generation is still current.

mod slot;
mod state;

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{Asset, CacheKey, TieredCache};
use crate::data::{CitySearchResult, IconOrigin, WeatherService, WeatherSnapshot, WeatherTarget};
use crate::error::{location_failure_message, FailureKind};
use crate::location::{LocationAcquirer, LocationError, PermissionFlag};
use crate::prefs::PreferenceStore;

use slot::Slot;
pub use state::{OrchestratorSettings, SearchState, WeatherState};

/// External services the orchestrator depends on
pub struct Collaborators {
    pub weather: Arc<dyn WeatherService>,
    pub icons: Arc<dyn IconOrigin>,
    pub prefs: Arc<dyn PreferenceStore>,
}

/// Why a weather load produced no snapshot
enum LoadError {
    /// Superseded or cancelled; nothing is published
    Cancelled,
    Failed(String),
}

struct Inner {
    weather: Arc<dyn WeatherService>,
    icons: Arc<dyn IconOrigin>,
    prefs: Arc<dyn PreferenceStore>,
    cache: TieredCache,
    location: Arc<LocationAcquirer>,
    settings: OrchestratorSettings,

    weather_tx: watch::Sender<WeatherState>,
    search_tx: watch::Sender<SearchState>,
    query_tx: watch::Sender<String>,

    weather_slot: Mutex<Slot>,
    search_slot: Mutex<Slot>,
    last_target: Mutex<Option<WeatherTarget>>,
}

/// Coordinates weather loads, city search, the icon cache, and location.
///
/// Cloning yields another handle to the same orchestrator. All operations
/// must be called from within a Tokio runtime.
#[derive(Clone)]
pub struct RequestOrchestrator {
    inner: Arc<Inner>,
}

impl RequestOrchestrator {
    /// Creates a new orchestrator in the `Idle`/`Idle` state
    ///
    /// # Arguments
    /// * `collaborators` - Weather, icon, and preference services
    /// * `cache` - Icon cache shared with anything else that needs icons
    /// * `location` - Acquirer used for current-location loads; its
    ///   permission flag is the one `on_permission_result` updates
    /// * `settings` - Debounce and search tuning
    pub fn new(
        collaborators: Collaborators,
        cache: TieredCache,
        location: Arc<LocationAcquirer>,
        settings: OrchestratorSettings,
    ) -> Self {
        let (weather_tx, _) = watch::channel(WeatherState::Idle);
        let (search_tx, _) = watch::channel(SearchState::Idle);
        let (query_tx, _) = watch::channel(String::new());

        Self {
            inner: Arc::new(Inner {
                weather: collaborators.weather,
                icons: collaborators.icons,
                prefs: collaborators.prefs,
                cache,
                location,
                settings,
                weather_tx,
                search_tx,
                query_tx,
                weather_slot: Mutex::new(Slot::default()),
                search_slot: Mutex::new(Slot::default()),
                last_target: Mutex::new(None),
            }),
        }
    }

    /// Runs the startup policy.
    ///
    /// Loads the saved city if there is one, otherwise the current location
    /// if permission is already granted, otherwise stays `Idle`.
    pub fn start(&self) {
        let (generation, token) = self.inner.weather_slot.lock().supersede();
        let inner = Arc::clone(&self.inner);

        let task = tokio::spawn(async move {
            let saved = tokio::select! {
                _ = token.cancelled() => return,
                saved = inner.prefs.read_last_target() => saved,
            };

            let target = match saved {
                Some(last) => WeatherTarget::City {
                    name: last.city,
                    state: last.state,
                },
                None if inner.location.permission().is_granted() => WeatherTarget::CurrentLocation,
                None => {
                    info!("No saved city and no location permission; waiting for the user");
                    return;
                }
            };

            info!(?target, "Starting initial weather load");
            if inner.claim_target(generation, &target) {
                inner.run_load(generation, token, target).await;
            }
        });

        self.inner.weather_slot.lock().attach(generation, task);
    }

    /// Loads weather for a named city, superseding any load in flight.
    pub fn load_city(&self, name: impl Into<String>, state: Option<String>) {
        self.begin_load(WeatherTarget::City {
            name: name.into(),
            state,
        });
    }

    /// Loads weather for the current location, superseding any load in
    /// flight. Fails with a permission message when access is not granted.
    pub fn load_current_location(&self) {
        self.begin_load(WeatherTarget::CurrentLocation);
    }

    /// Re-runs the most recent weather target. Does nothing before the first
    /// load.
    pub fn refresh(&self) {
        let target = self.inner.last_target.lock().clone();
        match target {
            Some(target) => self.begin_load(target),
            None => debug!("Refresh requested with no previous target"),
        }
    }

    /// Records a permission decision. A grant while the weather panel is
    /// still `Idle` starts a current-location load.
    pub fn on_permission_result(&self, granted: bool) {
        self.inner.location.permission().set(granted);
        info!(granted, "Location permission updated");

        let idle = matches!(*self.inner.weather_tx.borrow(), WeatherState::Idle);
        if granted && idle {
            self.load_current_location();
        }
    }

    /// Feeds one edit of the search box.
    ///
    /// Any pending or in-flight search is cancelled. Queries shorter than the
    /// minimum length reset search to `Idle` at once; anything longer is
    /// searched after the debounce window passes with no further edits.
    pub fn update_search_query(&self, query: impl Into<String>) {
        let query = query.into();
        self.inner.query_tx.send_replace(query.clone());

        let trimmed = query.trim().to_string();
        if trimmed.chars().count() < self.inner.settings.min_query_len {
            let mut slot = self.inner.search_slot.lock();
            slot.cancel();
            self.inner.search_tx.send_replace(SearchState::Idle);
            return;
        }

        let (generation, token) = self.inner.search_slot.lock().supersede();
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(inner.settings.debounce) => {}
            }
            inner.run_search(generation, token, trimmed).await;
        });
        self.inner.search_slot.lock().attach(generation, task);
    }

    /// Picks a search result: the query shows its display name, search goes
    /// back to `Idle`, and a weather load starts for the city.
    pub fn select_city(&self, city: &CitySearchResult) {
        {
            let mut slot = self.inner.search_slot.lock();
            slot.cancel();
            self.inner.query_tx.send_replace(city.display_name());
            self.inner.search_tx.send_replace(SearchState::Idle);
        }
        info!(city = %city.display_name(), "City selected");
        self.load_city(city.name.clone(), city.state.clone());
    }

    /// Cancels any search and empties the query.
    pub fn clear_search(&self) {
        let mut slot = self.inner.search_slot.lock();
        slot.cancel();
        self.inner.query_tx.send_replace(String::new());
        self.inner.search_tx.send_replace(SearchState::Idle);
    }

    /// Cancels all outstanding work. State is left as it was.
    pub fn shutdown(&self) {
        self.inner.weather_slot.lock().cancel();
        self.inner.search_slot.lock().cancel();
    }

    pub fn weather_state(&self) -> WeatherState {
        self.inner.weather_tx.borrow().clone()
    }

    pub fn search_state(&self) -> SearchState {
        self.inner.search_tx.borrow().clone()
    }

    pub fn query(&self) -> String {
        self.inner.query_tx.borrow().clone()
    }

    pub fn subscribe_weather(&self) -> watch::Receiver<WeatherState> {
        self.inner.weather_tx.subscribe()
    }

    pub fn subscribe_search(&self) -> watch::Receiver<SearchState> {
        self.inner.search_tx.subscribe()
    }

    pub fn subscribe_query(&self) -> watch::Receiver<String> {
        self.inner.query_tx.subscribe()
    }

    pub fn permission(&self) -> &PermissionFlag {
        self.inner.location.permission()
    }

    /// The icon cache, for maintenance such as clearing
    pub fn cache(&self) -> &TieredCache {
        &self.inner.cache
    }

    /// Forgets the saved city so the next start does not load it.
    pub async fn forget_last_target(&self) {
        self.inner.prefs.clear_last_target().await;
    }

    fn begin_load(&self, target: WeatherTarget) {
        info!(?target, "Loading weather");

        let (generation, token) = {
            let mut slot = self.inner.weather_slot.lock();
            let claim = slot.supersede();
            *self.inner.last_target.lock() = Some(target.clone());
            self.inner.weather_tx.send_replace(WeatherState::Loading);
            claim
        };

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            inner.run_load(generation, token, target).await;
        });
        self.inner.weather_slot.lock().attach(generation, task);
    }
}

impl Inner {
    /// Publishes `state` if `generation` still owns the weather slot.
    fn publish_weather(&self, generation: u64, state: WeatherState) -> bool {
        let slot = self.weather_slot.lock();
        if !slot.is_current(generation) {
            debug!(generation, "Dropping weather update from superseded load");
            return false;
        }
        self.weather_tx.send_replace(state);
        true
    }

    /// Records `target` as the refresh target and publishes `Loading`, if
    /// `generation` still owns the weather slot.
    fn claim_target(&self, generation: u64, target: &WeatherTarget) -> bool {
        let slot = self.weather_slot.lock();
        if !slot.is_current(generation) {
            debug!(generation, "Dropping startup target from superseded load");
            return false;
        }
        *self.last_target.lock() = Some(target.clone());
        self.weather_tx.send_replace(WeatherState::Loading);
        true
    }

    fn publish_search(&self, generation: u64, state: SearchState) -> bool {
        let slot = self.search_slot.lock();
        if !slot.is_current(generation) {
            debug!(generation, "Dropping search update from superseded search");
            return false;
        }
        self.search_tx.send_replace(state);
        true
    }

    /// Fills in the icon of a `Ready` state in place.
    fn attach_icon(&self, generation: u64, asset: Asset) {
        let slot = self.weather_slot.lock();
        if !slot.is_current(generation) {
            return;
        }
        self.weather_tx.send_if_modified(|state| match state {
            WeatherState::Ready { icon, .. } if icon.is_none() => {
                *icon = Some(asset);
                true
            }
            _ => false,
        });
    }

    async fn run_load(&self, generation: u64, token: CancellationToken, target: WeatherTarget) {
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            result = self.fetch_weather(&target, &token) => result,
        };

        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(LoadError::Cancelled) => return,
            Err(LoadError::Failed(message)) => {
                warn!(?target, reason = %message, "Weather load failed");
                self.publish_weather(generation, WeatherState::Failed(message));
                return;
            }
        };

        info!(city = %snapshot.city_name, temp = snapshot.temperature, "Weather loaded");
        let ready = WeatherState::Ready {
            snapshot: snapshot.clone(),
            icon: None,
        };
        if !self.publish_weather(generation, ready) {
            return;
        }

        match &target {
            WeatherTarget::City { name, state } => {
                self.prefs.write_last_target(name, state.as_deref()).await;
            }
            WeatherTarget::CurrentLocation if !snapshot.city_name.is_empty() => {
                self.prefs.write_last_target(&snapshot.city_name, None).await;
            }
            WeatherTarget::CurrentLocation => {}
        }

        let icon = tokio::select! {
            _ = token.cancelled() => return,
            icon = self.load_icon(&snapshot.icon_code) => icon,
        };
        if let Some(asset) = icon {
            self.attach_icon(generation, asset);
        }
    }

    async fn fetch_weather(
        &self,
        target: &WeatherTarget,
        token: &CancellationToken,
    ) -> Result<WeatherSnapshot, LoadError> {
        let country = &self.settings.country;
        let result = match target {
            WeatherTarget::City { name, state } => {
                self.weather
                    .fetch_by_city(name, state.as_deref(), country)
                    .await
            }
            WeatherTarget::CurrentLocation => {
                let fix = match self.location.acquire(token).await {
                    Ok(fix) => fix,
                    Err(LocationError::Cancelled) => return Err(LoadError::Cancelled),
                    Err(e) => return Err(LoadError::Failed(location_failure_message(&e))),
                };
                self.weather
                    .fetch_by_coordinates(fix.latitude, fix.longitude)
                    .await
            }
        };

        result.map_err(|e| {
            let kind = FailureKind::classify(&e);
            debug!(error = %e, ?kind, "Weather request failed");
            LoadError::Failed(kind.message().to_string())
        })
    }

    /// Looks the icon up in the cache, falling back to the origin and
    /// populating the cache on success. Every failure is a plain `None`.
    async fn load_icon(&self, icon_code: &str) -> Option<Asset> {
        if icon_code.is_empty() {
            return None;
        }

        let key = CacheKey::icon(icon_code);
        if let Some(asset) = self.cache.get(&key).await {
            return Some(asset);
        }

        debug!(key = %key, "Icon cache miss; fetching from origin");
        match self.icons.fetch_icon(icon_code).await {
            Ok(bytes) => {
                let asset = Asset::decode(bytes)?;
                self.cache.put(key, asset.clone()).await;
                Some(asset)
            }
            Err(e) => {
                warn!(icon = icon_code, error = %e, "Icon fetch failed");
                None
            }
        }
    }

    async fn run_search(&self, generation: u64, token: CancellationToken, query: String) {
        if !self.publish_search(generation, SearchState::Searching) {
            return;
        }
        debug!(query = %query, "Searching cities");

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            result = self.weather.search_cities(
                &query,
                &self.settings.country,
                self.settings.search_limit,
            ) => result,
        };

        let next = match result {
            Ok(cities) if cities.is_empty() => {
                SearchState::Failed(format!("No cities found matching '{}'", query))
            }
            Ok(cities) => SearchState::Results(cities),
            Err(e) => {
                warn!(query = %query, error = %e, "City search failed");
                SearchState::Failed(FailureKind::classify(&e).message().to_string())
            }
        };
        self.publish_search(generation, next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::GeoFix;
    use crate::test_support::{
        city_result, new_york, settle, snapshot, HarnessBuilder, MemoryPrefs, MockIcons,
        MockWeather,
    };
    use std::time::Duration;

    fn ready_city(state: &WeatherState) -> Option<&str> {
        state.snapshot().map(|s| s.city_name.as_str())
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_issues_single_search_for_last_input() {
        let weather = MockWeather::default().with_search("New", vec![new_york()]);
        let harness = HarnessBuilder::new(weather).build();
        let orchestrator = &harness.orchestrator;

        orchestrator.update_search_query("N");
        tokio::time::sleep(Duration::from_millis(100)).await;
        orchestrator.update_search_query("Ne");
        tokio::time::sleep(Duration::from_millis(100)).await;
        orchestrator.update_search_query("New");
        settle().await;

        assert_eq!(*harness.weather.search_calls.lock(), vec!["New".to_string()]);
        assert_eq!(orchestrator.search_state(), SearchState::Results(vec![new_york()]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_not_sent_before_idle_window() {
        let weather = MockWeather::default().with_search("Ne", vec![new_york()]);
        let harness = HarnessBuilder::new(weather).build();
        let orchestrator = &harness.orchestrator;

        orchestrator.update_search_query("Ne");
        tokio::time::sleep(Duration::from_millis(250)).await;

        assert!(harness.weather.search_calls.lock().is_empty());
        assert_eq!(orchestrator.search_state(), SearchState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_then_select_loads_city() {
        let weather = MockWeather::default()
            .with_search("Ne", vec![new_york()])
            .with_city(snapshot("New York", "04d"));
        let harness = HarnessBuilder::new(weather).build();
        let orchestrator = &harness.orchestrator;

        orchestrator.update_search_query("Ne");
        settle().await;
        let results = match orchestrator.search_state() {
            SearchState::Results(results) => results,
            other => panic!("expected results, got {:?}", other),
        };
        assert_eq!(results, vec![new_york()]);

        orchestrator.select_city(&results[0]);
        assert_eq!(orchestrator.search_state(), SearchState::Idle);
        assert_eq!(orchestrator.query(), "New York, NY, US");
        settle().await;

        assert_eq!(
            *harness.weather.city_calls.lock(),
            vec![("New York".to_string(), Some("NY".to_string()))]
        );
        assert_eq!(ready_city(&orchestrator.weather_state()), Some("New York"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_query_resets_search_immediately() {
        let weather = MockWeather::default().with_search("Ne", vec![new_york()]);
        let harness = HarnessBuilder::new(weather).build();
        let orchestrator = &harness.orchestrator;

        orchestrator.update_search_query("Ne");
        settle().await;
        assert!(matches!(orchestrator.search_state(), SearchState::Results(_)));

        orchestrator.update_search_query("N");

        assert_eq!(orchestrator.search_state(), SearchState::Idle);
        assert_eq!(orchestrator.query(), "N");
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_query_cancels_pending_search() {
        let harness = HarnessBuilder::new(MockWeather::default()).build();
        let orchestrator = &harness.orchestrator;

        orchestrator.update_search_query("Bos");
        orchestrator.update_search_query("B");
        settle().await;

        assert!(harness.weather.search_calls.lock().is_empty());
        assert_eq!(orchestrator.search_state(), SearchState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_search_is_superseded_by_newer_query() {
        let boston = city_result("Boston", "MA", 42.36, -71.06);
        let denver = city_result("Denver", "CO", 39.74, -104.99);
        let weather = MockWeather::default()
            .with_search("Bos", vec![boston.clone()])
            .with_search_delay("Bos", Duration::from_secs(1))
            .with_search("Den", vec![denver.clone()]);
        let harness = HarnessBuilder::new(weather).build();
        let orchestrator = &harness.orchestrator;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut updates = orchestrator.subscribe_search();
        let recorder = {
            let seen = Arc::clone(&seen);
            tokio::spawn(async move {
                while updates.changed().await.is_ok() {
                    let state = updates.borrow_and_update().clone();
                    seen.lock().push(state);
                }
            })
        };

        orchestrator.update_search_query("Bos");
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(orchestrator.search_state(), SearchState::Searching);

        orchestrator.update_search_query("Den");
        settle().await;
        recorder.abort();

        assert_eq!(
            *harness.weather.search_calls.lock(),
            vec!["Bos".to_string(), "Den".to_string()]
        );
        assert_eq!(orchestrator.search_state(), SearchState::Results(vec![denver]));
        let stale = SearchState::Results(vec![boston]);
        assert!(
            !seen.lock().contains(&stale),
            "superseded search published its results: {:?}",
            seen.lock()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_search_result_is_failure() {
        let harness = HarnessBuilder::new(MockWeather::default()).build();

        harness.orchestrator.update_search_query("Zzyzx");
        settle().await;

        assert_eq!(
            harness.orchestrator.search_state(),
            SearchState::Failed("No cities found matching 'Zzyzx'".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_error_is_classified() {
        let harness = HarnessBuilder::new(MockWeather::default().failing_with(429)).build();

        harness.orchestrator.update_search_query("Boston");
        settle().await;

        assert_eq!(
            harness.orchestrator.search_state(),
            SearchState::Failed(FailureKind::RateLimited.message().to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_search_cancels_and_empties_query() {
        let harness = HarnessBuilder::new(MockWeather::default()).build();
        let orchestrator = &harness.orchestrator;

        orchestrator.update_search_query("Boston");
        orchestrator.clear_search();
        settle().await;

        assert!(harness.weather.search_calls.lock().is_empty());
        assert_eq!(orchestrator.query(), "");
        assert_eq!(orchestrator.search_state(), SearchState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_city_fails_with_not_found() {
        let harness = HarnessBuilder::new(MockWeather::default()).build();

        harness.orchestrator.load_city("Atlantis", None);
        assert_eq!(harness.orchestrator.weather_state(), WeatherState::Loading);
        settle().await;

        match harness.orchestrator.weather_state() {
            WeatherState::Failed(message) => assert!(message.starts_with("City not found")),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_location_exhaustion_fails_with_location_message() {
        let harness = HarnessBuilder::new(MockWeather::default())
            .permission(true)
            .location(None)
            .build();

        harness.orchestrator.load_current_location();
        settle().await;

        assert_eq!(
            harness.orchestrator.weather_state(),
            WeatherState::Failed("Unable to get location: no location available".to_string())
        );
        assert_eq!(harness.location_attempts.load(std::sync::atomic::Ordering::SeqCst), 3);
        assert!(harness.weather.coordinate_calls.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_location_without_permission_fails_fast() {
        let harness = HarnessBuilder::new(MockWeather::default())
            .permission(false)
            .location(Some(GeoFix::new(1.0, 2.0)))
            .build();

        harness.orchestrator.load_current_location();
        settle().await;

        assert_eq!(
            harness.orchestrator.weather_state(),
            WeatherState::Failed(FailureKind::PermissionDenied.message().to_string())
        );
        assert_eq!(harness.location_attempts.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_location_load_fetches_by_coordinates_and_saves_city() {
        let weather = MockWeather::default().with_coordinates(snapshot("Hoboken", "01d"));
        let harness = HarnessBuilder::new(weather)
            .permission(true)
            .location(Some(GeoFix::new(40.74, -74.03)))
            .build();

        harness.orchestrator.load_current_location();
        settle().await;

        assert_eq!(*harness.weather.coordinate_calls.lock(), vec![(40.74, -74.03)]);
        assert_eq!(ready_city(&harness.orchestrator.weather_state()), Some("Hoboken"));
        let saved = harness.prefs.target.lock().clone().expect("Should save target");
        assert_eq!(saved.city, "Hoboken");
        assert_eq!(saved.state, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_load_never_overwrites_successor() {
        let weather = MockWeather::default()
            .with_city(snapshot("Slowtown", "01d"))
            .with_city_delay("Slowtown", Duration::from_secs(2))
            .with_city(snapshot("Fastville", "02d"));
        let harness = HarnessBuilder::new(weather).build();
        let orchestrator = &harness.orchestrator;

        orchestrator.load_city("Slowtown", None);
        tokio::task::yield_now().await;
        orchestrator.load_city("Fastville", None);
        settle().await;

        assert_eq!(ready_city(&orchestrator.weather_state()), Some("Fastville"));
        let saved = harness.prefs.target.lock().clone().expect("Should save target");
        assert_eq!(saved.city, "Fastville");
    }

    #[tokio::test(start_paused = true)]
    async fn test_icon_attached_after_ready_and_cached() {
        let weather = MockWeather::default().with_city(snapshot("Boston", "10d"));
        let harness = HarnessBuilder::new(weather).build();
        let orchestrator = &harness.orchestrator;

        orchestrator.load_city("Boston", Some("MA".to_string()));
        settle().await;

        match orchestrator.weather_state() {
            WeatherState::Ready { icon: Some(icon), .. } => {
                assert_eq!(icon.as_bytes(), crate::test_support::ICON_BYTES);
            }
            other => panic!("expected ready with icon, got {:?}", other),
        }
        assert!(orchestrator.cache().memory().contains(&CacheKey::icon("10d")));

        orchestrator.refresh();
        settle().await;

        assert_eq!(harness.icons.fetch_count(), 1);
        assert_eq!(harness.weather.city_calls.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_icon_failure_leaves_ready_without_icon() {
        let weather = MockWeather::default().with_city(snapshot("Boston", "10d"));
        let harness = HarnessBuilder::new(weather)
            .icons(MockIcons::failing())
            .build();

        harness.orchestrator.load_city("Boston", None);
        settle().await;

        match harness.orchestrator.weather_state() {
            WeatherState::Ready { snapshot, icon } => {
                assert_eq!(snapshot.city_name, "Boston");
                assert!(icon.is_none());
            }
            other => panic!("expected ready, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_weather_http_errors_map_to_messages() {
        let harness = HarnessBuilder::new(MockWeather::default().failing_with(401)).build();

        harness.orchestrator.load_city("Boston", None);
        settle().await;

        assert_eq!(
            harness.orchestrator.weather_state(),
            WeatherState::Failed("API key error. Please check your configuration.".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_city_load_saves_preferences() {
        let weather = MockWeather::default().with_city(snapshot("Austin", "01d"));
        let harness = HarnessBuilder::new(weather).build();

        harness.orchestrator.load_city("Austin", Some("TX".to_string()));
        settle().await;

        let saved = harness.prefs.target.lock().clone().expect("Should save target");
        assert_eq!(saved.city, "Austin");
        assert_eq!(saved.state.as_deref(), Some("TX"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_load_does_not_save_preferences() {
        let harness = HarnessBuilder::new(MockWeather::default()).build();

        harness.orchestrator.load_city("Atlantis", None);
        settle().await;

        assert!(harness.prefs.target.lock().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_loads_saved_city() {
        let weather = MockWeather::default().with_city(snapshot("Denver", "01d"));
        let harness = HarnessBuilder::new(weather)
            .prefs(MemoryPrefs::saved("Denver", Some("CO")))
            .permission(true)
            .location(Some(GeoFix::new(0.0, 0.0)))
            .build();

        harness.orchestrator.start();
        settle().await;

        assert_eq!(
            *harness.weather.city_calls.lock(),
            vec![("Denver".to_string(), Some("CO".to_string()))]
        );
        assert_eq!(ready_city(&harness.orchestrator.weather_state()), Some("Denver"));
        assert_eq!(harness.location_attempts.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_uses_location_when_permitted() {
        let weather = MockWeather::default().with_coordinates(snapshot("Here", "01d"));
        let harness = HarnessBuilder::new(weather)
            .permission(true)
            .location(Some(GeoFix::new(10.0, 20.0)))
            .build();

        harness.orchestrator.start();
        settle().await;

        assert_eq!(*harness.weather.coordinate_calls.lock(), vec![(10.0, 20.0)]);
        assert_eq!(ready_city(&harness.orchestrator.weather_state()), Some("Here"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_without_saved_city_or_permission_stays_idle() {
        let harness = HarnessBuilder::new(MockWeather::default()).build();

        harness.orchestrator.start();
        settle().await;

        assert_eq!(harness.orchestrator.weather_state(), WeatherState::Idle);
        assert_eq!(harness.location_attempts.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permission_grant_while_idle_loads_location() {
        let weather = MockWeather::default().with_coordinates(snapshot("Here", "01d"));
        let harness = HarnessBuilder::new(weather)
            .location(Some(GeoFix::new(10.0, 20.0)))
            .build();

        harness.orchestrator.start();
        settle().await;
        harness.orchestrator.on_permission_result(true);
        settle().await;

        assert!(harness.permission.is_granted());
        assert_eq!(ready_city(&harness.orchestrator.weather_state()), Some("Here"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permission_grant_after_load_does_nothing() {
        let weather = MockWeather::default().with_city(snapshot("Boston", "01d"));
        let harness = HarnessBuilder::new(weather)
            .location(Some(GeoFix::new(10.0, 20.0)))
            .build();

        harness.orchestrator.load_city("Boston", None);
        settle().await;
        harness.orchestrator.on_permission_result(true);
        settle().await;

        assert!(harness.weather.coordinate_calls.lock().is_empty());
        assert_eq!(ready_city(&harness.orchestrator.weather_state()), Some("Boston"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_during_startup_keeps_refresh_target() {
        let weather = MockWeather::default()
            .with_city(snapshot("Boston", "01d"))
            .with_city(snapshot("Denver", "02d"));
        let prefs =
            MemoryPrefs::saved("Boston", Some("MA")).with_read_delay(Duration::from_millis(200));
        let harness = HarnessBuilder::new(weather).prefs(prefs).build();
        let orchestrator = &harness.orchestrator;

        orchestrator.start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        orchestrator.load_city("Denver", Some("CO".to_string()));
        settle().await;
        orchestrator.refresh();
        settle().await;

        let denver = ("Denver".to_string(), Some("CO".to_string()));
        assert_eq!(*harness.weather.city_calls.lock(), vec![denver.clone(), denver]);
        assert_eq!(ready_city(&orchestrator.weather_state()), Some("Denver"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_without_target_is_noop() {
        let harness = HarnessBuilder::new(MockWeather::default()).build();

        harness.orchestrator.refresh();
        settle().await;

        assert_eq!(harness.orchestrator.weather_state(), WeatherState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forget_last_target_clears_prefs() {
        let harness = HarnessBuilder::new(MockWeather::default())
            .prefs(MemoryPrefs::saved("Denver", None))
            .build();

        harness.orchestrator.forget_last_target().await;

        assert!(harness.prefs.target.lock().is_none());
    }
}
