//! OpenWeatherMap API client
//!
//! Implements the weather, geocoding, and icon collaborators on top of the
//! OpenWeatherMap REST endpoints and parses the JSON responses into our data
//! structures.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{CitySearchResult, GeoFix, IconOrigin, WeatherService, WeatherSnapshot};
use crate::error::ApiError;

/// Base URL for the OpenWeatherMap API
const OPENWEATHER_BASE_URL: &str = "https://api.openweathermap.org";

/// Base URL for condition icons
const ICON_BASE_URL: &str = "https://openweathermap.org/img/wn";

/// Client for the OpenWeatherMap weather, geocoding, and icon endpoints
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    client: Client,
    api_key: String,
    base_url: String,
    icon_base_url: String,
}

impl OpenWeatherClient {
    /// Creates a client whose requests give up after `timeout`.
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: OPENWEATHER_BASE_URL.to_string(),
            icon_base_url: ICON_BASE_URL.to_string(),
        })
    }

    /// Points the client at different hosts (for testing)
    pub fn with_base_urls(
        mut self,
        base_url: impl Into<String>,
        icon_base_url: impl Into<String>,
    ) -> Self {
        self.base_url = base_url.into();
        self.icon_base_url = icon_base_url.into();
        self
    }

    async fn get_text(&self, url: &str, query: &[(&str, String)]) -> Result<String, ApiError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(ApiError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Http {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        response.text().await.map_err(ApiError::from_transport)
    }

    async fn geocode(&self, query: &str, limit: usize) -> Result<Vec<CitySearchResult>, ApiError> {
        let url = format!("{}/geo/1.0/direct", self.base_url);
        let body = self
            .get_text(
                &url,
                &[
                    ("q", query.to_string()),
                    ("limit", limit.to_string()),
                    ("appid", self.api_key.clone()),
                ],
            )
            .await?;
        parse_city_search_response(&body)
    }
}

#[async_trait]
impl WeatherService for OpenWeatherClient {
    async fn fetch_by_coordinates(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<WeatherSnapshot, ApiError> {
        let url = format!("{}/data/2.5/weather", self.base_url);
        let body = self
            .get_text(
                &url,
                &[
                    ("lat", latitude.to_string()),
                    ("lon", longitude.to_string()),
                    ("appid", self.api_key.clone()),
                    ("units", "metric".to_string()),
                ],
            )
            .await?;
        parse_weather_response(&body)
    }

    /// Geocodes the city (first match only) and fetches weather for it.
    async fn fetch_by_city(
        &self,
        name: &str,
        state: Option<&str>,
        country: &str,
    ) -> Result<WeatherSnapshot, ApiError> {
        let query = build_city_query(name, state, country);
        let cities = self.geocode(&query, 1).await?;
        let city = cities.first().ok_or(ApiError::CityNotFound)?;
        debug!(query = %query, lat = city.latitude, lon = city.longitude, "Geocoded city");
        self.fetch_by_coordinates(city.latitude, city.longitude).await
    }

    /// Searches for cities in `country`.
    ///
    /// The geocoder is not country-aware, so twice the limit is requested and
    /// filtered locally. If nothing survives the filter, the query is retried
    /// once with the country appended.
    async fn search_cities(
        &self,
        query: &str,
        country: &str,
        limit: usize,
    ) -> Result<Vec<CitySearchResult>, ApiError> {
        let cities = self.geocode(query, limit * 2).await?;
        let filtered = filter_by_country(cities, country, limit);
        if !filtered.is_empty() {
            return Ok(filtered);
        }

        let qualified = format!("{},{}", query, country);
        match self.geocode(&qualified, limit).await {
            Ok(cities) => Ok(cities.into_iter().take(limit).collect()),
            Err(e) => {
                debug!(query = %qualified, error = %e, "Country-qualified search failed");
                Ok(filtered)
            }
        }
    }
}

#[async_trait]
impl IconOrigin for OpenWeatherClient {
    async fn fetch_icon(&self, icon_code: &str) -> Result<Vec<u8>, ApiError> {
        let url = format!("{}/{}@2x.png", self.icon_base_url, icon_code);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(ApiError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Http {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let bytes = response.bytes().await.map_err(ApiError::from_transport)?;
        if bytes.is_empty() {
            return Err(ApiError::EmptyBody);
        }
        Ok(bytes.to_vec())
    }
}

/// Builds a geocoding query of the form "name[,state],country".
pub fn build_city_query(name: &str, state: Option<&str>, country: &str) -> String {
    match state {
        Some(state) => format!("{},{},{}", name, state, country),
        None => format!("{},{}", name, country),
    }
}

/// Keeps up to `limit` cities whose country matches, ignoring case.
pub fn filter_by_country(
    cities: Vec<CitySearchResult>,
    country: &str,
    limit: usize,
) -> Vec<CitySearchResult> {
    cities
        .into_iter()
        .filter(|city| city.country.eq_ignore_ascii_case(country))
        .take(limit)
        .collect()
}

/// Parse a current-weather response into a [`WeatherSnapshot`]
pub fn parse_weather_response(json: &str) -> Result<WeatherSnapshot, ApiError> {
    let response: WeatherResponse = serde_json::from_str(json)?;
    let condition = response
        .weather
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::MissingField("weather".to_string()))?;

    Ok(WeatherSnapshot {
        city_name: response.name,
        country: response.sys.country.unwrap_or_default(),
        temperature: response.main.temp,
        feels_like: response.main.feels_like,
        temp_min: response.main.temp_min,
        temp_max: response.main.temp_max,
        humidity: response.main.humidity.min(100) as u8,
        pressure: response.main.pressure,
        wind_speed: response.wind.and_then(|w| w.speed).unwrap_or(0.0),
        condition: condition.main,
        description: condition.description,
        icon_code: condition.icon,
        visibility: response.visibility.unwrap_or(0),
        cloudiness: response
            .clouds
            .and_then(|c| c.all)
            .unwrap_or(0)
            .min(100) as u8,
        sunrise: response.sys.sunrise.and_then(timestamp),
        sunset: response.sys.sunset.and_then(timestamp),
        location: GeoFix::new(response.coord.lat, response.coord.lon),
        fetched_at: Utc::now(),
    })
}

/// Parse a geocoding response into search results
pub fn parse_city_search_response(json: &str) -> Result<Vec<CitySearchResult>, ApiError> {
    let entries: Vec<GeocodeEntry> = serde_json::from_str(json)?;
    Ok(entries
        .into_iter()
        .map(|entry| CitySearchResult {
            name: entry.name,
            state: entry.state.filter(|s| !s.is_empty()),
            country: entry.country,
            latitude: entry.lat,
            longitude: entry.lon,
        })
        .collect())
}

/// Converts a Unix timestamp; zero means the provider had no value.
fn timestamp(secs: i64) -> Option<DateTime<Utc>> {
    if secs == 0 {
        return None;
    }
    DateTime::from_timestamp(secs, 0)
}

/// Current weather response structure
#[derive(Debug, Deserialize)]
struct WeatherResponse {
    coord: Coord,
    weather: Vec<Condition>,
    main: MainReadings,
    wind: Option<Wind>,
    clouds: Option<Clouds>,
    visibility: Option<u32>,
    sys: Sys,
    name: String,
}

#[derive(Debug, Deserialize)]
struct Coord {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct Condition {
    main: String,
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: f64,
    feels_like: f64,
    temp_min: f64,
    temp_max: f64,
    humidity: u32,
    pressure: u32,
}

#[derive(Debug, Deserialize)]
struct Wind {
    speed: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Clouds {
    all: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct Sys {
    country: Option<String>,
    sunrise: Option<i64>,
    sunset: Option<i64>,
}

/// One entry of a geocoding response
#[derive(Debug, Deserialize)]
struct GeocodeEntry {
    name: String,
    state: Option<String>,
    country: String,
    lat: f64,
    lon: f64,
}
