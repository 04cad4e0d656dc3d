//! Nimbus library
//!
//! A terminal weather client built around three pieces: a two-tier icon cache,
//! a fallback chain for finding the current location, and an orchestrator
//! that debounces city search and keeps superseded requests from publishing.
//! The binary wires these to OpenWeatherMap and a ratatui front end.

pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod location;
pub mod logging;
pub mod orchestrator;
pub mod prefs;
pub mod ui;

#[cfg(test)]
mod test_support;
