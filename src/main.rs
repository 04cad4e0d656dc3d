//! Nimbus - current weather in the terminal
//!
//! A terminal UI application that shows current conditions for a searched
//! city or the machine's approximate location, with condition icons kept in
//! a memory-over-disk cache.

use std::io;
use std::panic;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{info, warn};

use nimbus::app::App;
use nimbus::cache::{DiskTier, MemoryTier, TieredCache};
use nimbus::cli::{Cli, InitialLoad, LocationPermission, StartupConfig};
use nimbus::config::{Config, API_KEY_ENV};
use nimbus::data::OpenWeatherClient;
use nimbus::location::{IpLocationSource, LocationAcquirer, PermissionFlag};
use nimbus::logging;
use nimbus::orchestrator::{Collaborators, RequestOrchestrator};
use nimbus::prefs::FilePreferences;
use nimbus::ui;

/// Sets up a panic hook that restores the terminal before printing the panic message.
/// This ensures the terminal is usable even if the application panics.
fn setup_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));
}

/// Wires the cache, collaborators, and location chain into an orchestrator.
fn build_orchestrator(
    config: &Config,
    startup: &StartupConfig,
) -> Result<RequestOrchestrator, Box<dyn std::error::Error>> {
    let cache = TieredCache::new(
        MemoryTier::new(config.memory_budget()),
        DiskTier::new(config.icon_dir(), config.disk_budget()),
    );

    let client = Arc::new(OpenWeatherClient::new(config.api_key.clone(), config.http_timeout)?);
    let prefs = Arc::new(FilePreferences::new(config.prefs_path()));

    let permission = PermissionFlag::new(startup.permission == LocationPermission::Granted);
    let source = Arc::new(IpLocationSource::new(config.http_timeout)?);
    let acquirer = LocationAcquirer::new(
        source,
        permission,
        config.location_timeout,
        config.single_update_interval,
    );

    Ok(RequestOrchestrator::new(
        Collaborators {
            weather: client.clone(),
            icons: client,
            prefs,
        },
        cache,
        Arc::new(acquirer),
        config.orchestrator_settings(),
    ))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Validate arguments before touching the terminal
    let cli = Cli::parse();
    let startup = match StartupConfig::from_cli(&cli) {
        Ok(startup) => startup,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(2);
        }
    };

    let mut config = Config::from_env().ok_or("could not determine a home directory")?;
    if let Some(dir) = &startup.cache_dir {
        config = config.with_cache_dir(dir);
    }

    let _log_guard = logging::init_logging(&config.log_dir(), logging::LOG_FILE)?;
    info!(cache_dir = %config.cache_dir.display(), ?startup, "Starting nimbus");
    if !config.has_api_key() {
        warn!("{} is not set; weather requests will be rejected", API_KEY_ENV);
    }

    let orchestrator = build_orchestrator(&config, &startup)?;
    if startup.clear_cache {
        orchestrator.cache().clear_all().await;
        info!("Icon cache cleared");
    }
    if startup.forget {
        orchestrator.forget_last_target().await;
    }

    match &startup.initial {
        InitialLoad::Saved => orchestrator.start(),
        InitialLoad::City { name, state } => orchestrator.load_city(name.clone(), state.clone()),
        InitialLoad::CurrentLocation => orchestrator.load_current_location(),
    }

    // Set up panic hook to restore terminal on crash
    setup_panic_hook();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(
        orchestrator.clone(),
        startup.permission == LocationPermission::Denied,
    );

    // Main event loop
    loop {
        app.sync_state();
        terminal.draw(|f| ui::render(f, &app))?;

        // Poll for keyboard events with 100ms timeout
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key);
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    orchestrator.shutdown();
    info!("Shutting down");

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;

    Ok(())
}
