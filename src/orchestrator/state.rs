//! Observable state and tuning for the request orchestrator

use std::time::Duration;

use crate::cache::Asset;
use crate::data::{CitySearchResult, WeatherSnapshot};

/// Weather panel state
#[derive(Debug, Clone, PartialEq, Default)]
pub enum WeatherState {
    /// Nothing requested yet
    #[default]
    Idle,
    Loading,
    /// Weather is available; the icon arrives later, if at all
    Ready {
        snapshot: WeatherSnapshot,
        icon: Option<Asset>,
    },
    /// The load failed; the message is shown to the user as-is
    Failed(String),
}

impl WeatherState {
    pub fn snapshot(&self) -> Option<&WeatherSnapshot> {
        match self {
            WeatherState::Ready { snapshot, .. } => Some(snapshot),
            _ => None,
        }
    }
}

/// City search state
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SearchState {
    #[default]
    Idle,
    Searching,
    /// Never empty; zero matches is reported as `Failed`
    Results(Vec<CitySearchResult>),
    Failed(String),
}

/// Tuning knobs for [`RequestOrchestrator`](super::RequestOrchestrator)
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Idle window after the last keystroke before a search is issued
    pub debounce: Duration,
    /// Queries shorter than this are treated as no query
    pub min_query_len: usize,
    /// Maximum number of search results
    pub search_limit: usize,
    /// ISO country code searches and city loads are scoped to
    pub country: String,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            min_query_len: 2,
            search_limit: 5,
            country: "US".to_string(),
        }
    }
}
