//! Command-line interface parsing for Nimbus
//!
//! This module handles parsing of CLI arguments using clap and turns them into
//! a validated [`StartupConfig`]: what to load first, how location access is
//! treated, and which maintenance to run before the UI starts.

use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

/// Error types for CLI argument validation
#[derive(Debug, Error)]
pub enum CliError {
    /// `--city` was given an empty or whitespace-only name
    #[error("City name must not be empty")]
    EmptyCity,
}

/// Nimbus - current weather in the terminal
#[derive(Parser, Debug)]
#[command(name = "nimbus")]
#[command(about = "Current weather for a city or your location, in the terminal")]
#[command(version)]
pub struct Cli {
    /// Load weather for this city on startup
    ///
    /// Examples:
    ///   nimbus --city Boston
    ///   nimbus --city Springfield --state IL
    #[arg(long, value_name = "NAME", conflicts_with = "here")]
    pub city: Option<String>,

    /// State or region code that disambiguates --city
    #[arg(long, value_name = "CODE", requires = "city")]
    pub state: Option<String>,

    /// Load weather for the current location on startup
    #[arg(long, conflicts_with = "no_location")]
    pub here: bool,

    /// Allow location lookups without loading one on startup
    #[arg(long, conflicts_with = "no_location")]
    pub allow_location: bool,

    /// Never look up the current location
    #[arg(long)]
    pub no_location: bool,

    /// Empty the icon cache before starting
    #[arg(long)]
    pub clear_cache: bool,

    /// Forget the saved city before starting
    #[arg(long)]
    pub forget: bool,

    /// Use this directory for cached icons and logs
    #[arg(long, value_name = "PATH")]
    pub cache_dir: Option<PathBuf>,
}

/// What the weather panel loads when the UI starts
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InitialLoad {
    /// Saved city, else current location if allowed, else nothing
    #[default]
    Saved,
    City {
        name: String,
        state: Option<String>,
    },
    CurrentLocation,
}

/// How location access is treated for this session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocationPermission {
    /// Not granted yet; the `l` key grants it
    #[default]
    Ask,
    Granted,
    /// Denied for the whole session
    Denied,
}

/// Configuration derived from CLI arguments for application startup
#[derive(Debug, Clone, Default)]
pub struct StartupConfig {
    pub initial: InitialLoad,
    pub permission: LocationPermission,
    /// Run full cache invalidation before starting
    pub clear_cache: bool,
    /// Clear the saved city before starting
    pub forget: bool,
    pub cache_dir: Option<PathBuf>,
}

impl StartupConfig {
    /// Creates a StartupConfig from parsed CLI arguments.
    ///
    /// # Arguments
    /// * `cli` - The parsed CLI struct
    ///
    /// # Returns
    /// * `Ok(StartupConfig)` with appropriate settings
    /// * `Err(CliError)` if a city name is blank
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let initial = match &cli.city {
            Some(city) => {
                let name = city.trim();
                if name.is_empty() {
                    return Err(CliError::EmptyCity);
                }
                InitialLoad::City {
                    name: name.to_string(),
                    state: cli
                        .state
                        .as_deref()
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string),
                }
            }
            None if cli.here => InitialLoad::CurrentLocation,
            None => InitialLoad::Saved,
        };

        let permission = if cli.no_location {
            LocationPermission::Denied
        } else if cli.here || cli.allow_location {
            LocationPermission::Granted
        } else {
            LocationPermission::Ask
        };

        Ok(StartupConfig {
            initial,
            permission,
            clear_cache: cli.clear_cache,
            forget: cli.forget,
            cache_dir: cli.cache_dir.clone(),
        })
    }
}
