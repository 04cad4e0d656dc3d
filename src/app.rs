//! Application state management for Nimbus
//!
//! This module holds the front end's view state and maps key presses onto
//! orchestrator operations. The orchestrator owns the real weather and search
//! state; `App` keeps a copy that is refreshed once per frame.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::data::CitySearchResult;
use crate::orchestrator::{RequestOrchestrator, SearchState, WeatherState};

/// Which panel receives key presses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    /// Weather panel; single-key commands
    Weather,
    /// Search box; keys edit the query
    Search,
}

/// Main application struct managing view state
pub struct App {
    pub focus: Focus,
    /// Flag indicating the application should quit
    pub should_quit: bool,
    /// Flag to show help overlay
    pub show_help: bool,
    /// Latest weather state seen by the UI
    pub weather: WeatherState,
    /// Latest search state seen by the UI
    pub search: SearchState,
    /// Text shown in the search box
    pub query: String,
    /// Highlighted row in the results list
    pub selected_result: usize,
    /// Location access was denied for the session
    pub location_locked: bool,
    orchestrator: RequestOrchestrator,
}

impl App {
    /// Creates a new App driving `orchestrator`
    pub fn new(orchestrator: RequestOrchestrator, location_locked: bool) -> Self {
        let mut app = Self {
            focus: Focus::Weather,
            should_quit: false,
            show_help: false,
            weather: WeatherState::Idle,
            search: SearchState::Idle,
            query: String::new(),
            selected_result: 0,
            location_locked,
            orchestrator,
        };
        app.sync_state();
        app
    }

    pub fn orchestrator(&self) -> &RequestOrchestrator {
        &self.orchestrator
    }

    /// Copies the orchestrator's current state into the view.
    pub fn sync_state(&mut self) {
        self.weather = self.orchestrator.weather_state();
        self.query = self.orchestrator.query();

        let search = self.orchestrator.search_state();
        if search != self.search {
            self.selected_result = 0;
        }
        self.search = search;
    }

    /// Results currently listed, if any
    pub fn results(&self) -> &[CitySearchResult] {
        match &self.search {
            SearchState::Results(results) => results,
            _ => &[],
        }
    }

    /// Handles keyboard input
    ///
    /// Weather focus:
    /// - `/`: Focus the search box
    /// - `l`: Load the current location (grants permission unless denied)
    /// - `r`: Refresh / try again
    /// - `?`: Toggle help
    /// - `q`/`Esc`: Quit
    ///
    /// Search focus:
    /// - Characters and `Backspace`: Edit the query
    /// - `Up`/`Down`: Move through results
    /// - `Enter`: Load the highlighted city
    /// - `Esc`: Clear the search
    ///
    /// `Ctrl-C` quits from anywhere.
    pub fn handle_key(&mut self, key_event: KeyEvent) {
        if key_event.modifiers.contains(KeyModifiers::CONTROL)
            && key_event.code == KeyCode::Char('c')
        {
            self.should_quit = true;
            return;
        }

        // Help overlay intercepts all keys when shown
        if self.show_help {
            if matches!(key_event.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                self.show_help = false;
            }
            return;
        }

        match self.focus {
            Focus::Weather => match key_event.code {
                KeyCode::Char('q') | KeyCode::Esc => {
                    self.should_quit = true;
                }
                KeyCode::Char('/') => {
                    self.focus = Focus::Search;
                }
                KeyCode::Char('l') => {
                    self.use_current_location();
                }
                KeyCode::Char('r') => {
                    self.orchestrator.refresh();
                }
                KeyCode::Char('?') => {
                    self.show_help = true;
                }
                _ => {}
            },
            Focus::Search => match key_event.code {
                KeyCode::Esc => {
                    self.orchestrator.clear_search();
                    self.focus = Focus::Weather;
                }
                KeyCode::Enter => {
                    if let Some(city) = self.results().get(self.selected_result).cloned() {
                        self.orchestrator.select_city(&city);
                        self.focus = Focus::Weather;
                    }
                }
                KeyCode::Up => {
                    self.selected_result = self.selected_result.saturating_sub(1);
                }
                KeyCode::Down => {
                    let count = self.results().len();
                    if count > 0 {
                        self.selected_result = (self.selected_result + 1).min(count - 1);
                    }
                }
                KeyCode::Backspace => {
                    let mut query = self.orchestrator.query();
                    query.pop();
                    self.orchestrator.update_search_query(query);
                }
                KeyCode::Char(c) => {
                    let mut query = self.orchestrator.query();
                    query.push(c);
                    self.orchestrator.update_search_query(query);
                }
                _ => {}
            },
        }

        self.sync_state();
    }

    /// Pressing `l` counts as consent unless location was denied at startup.
    fn use_current_location(&mut self) {
        let permission = self.orchestrator.permission();
        if !self.location_locked && !permission.is_granted() {
            let was_idle = matches!(self.orchestrator.weather_state(), WeatherState::Idle);
            self.orchestrator.on_permission_result(true);
            if was_idle {
                // The grant itself started a location load.
                return;
            }
        }
        self.orchestrator.load_current_location();
    }
}
