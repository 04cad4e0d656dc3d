//! Core data models for Nimbus
//!
//! Value types passed between the weather collaborator, the orchestrator, and
//! the UI, plus the collaborator contracts themselves.

pub mod openweather;
pub mod temperature;

pub use openweather::OpenWeatherClient;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// A position fix in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoFix {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoFix {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Current conditions for one place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    /// Name of the place the report is for
    pub city_name: String,
    /// ISO country code, possibly empty
    pub country: String,
    /// Current temperature in Celsius
    pub temperature: f64,
    /// Feels-like temperature in Celsius
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    /// Relative humidity percentage (0-100)
    pub humidity: u8,
    /// Sea-level pressure in hPa
    pub pressure: u32,
    /// Wind speed in m/s
    pub wind_speed: f64,
    /// Short condition group, e.g. "Rain"
    pub condition: String,
    /// Longer description, e.g. "light rain"
    pub description: String,
    /// Provider icon code used as the icon cache key
    pub icon_code: String,
    /// Visibility in meters
    pub visibility: u32,
    /// Cloud cover percentage
    pub cloudiness: u8,
    pub sunrise: Option<DateTime<Utc>>,
    pub sunset: Option<DateTime<Utc>>,
    /// Coordinates the report resolved to
    pub location: GeoFix,
    /// When this data was fetched
    pub fetched_at: DateTime<Utc>,
}

/// One candidate returned by a city search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitySearchResult {
    pub name: String,
    pub state: Option<String>,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl CitySearchResult {
    /// "Name, State, Country", skipping the state when unknown.
    pub fn display_name(&self) -> String {
        let mut out = self.name.clone();
        if let Some(state) = &self.state {
            out.push_str(", ");
            out.push_str(state);
        }
        out.push_str(", ");
        out.push_str(&self.country);
        out
    }
}

/// What a weather load is for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeatherTarget {
    /// A named city, optionally qualified by state
    City { name: String, state: Option<String> },
    /// Wherever the device currently is
    CurrentLocation,
}

/// Weather and geocoding lookups
#[async_trait]
pub trait WeatherService: Send + Sync {
    async fn fetch_by_coordinates(&self, latitude: f64, longitude: f64)
        -> Result<WeatherSnapshot, ApiError>;

    async fn fetch_by_city(
        &self,
        name: &str,
        state: Option<&str>,
        country: &str,
    ) -> Result<WeatherSnapshot, ApiError>;

    async fn search_cities(
        &self,
        query: &str,
        country: &str,
        limit: usize,
    ) -> Result<Vec<CitySearchResult>, ApiError>;
}

/// Origin for icon bytes, consulted on a cache miss
#[async_trait]
pub trait IconOrigin: Send + Sync {
    async fn fetch_icon(&self, icon_code: &str) -> Result<Vec<u8>, ApiError>;
}
