//! UI rendering module for Nimbus
//!
//! This module contains all the rendering logic for the terminal user interface,
//! using the ratatui library for TUI components.

pub mod help_overlay;
pub mod search_panel;
pub mod weather_panel;

use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::app::{App, Focus};

pub use help_overlay::render as render_help_overlay;

/// Renders the whole screen for the current application state
pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(10),
            Constraint::Length(10),
            Constraint::Length(1),
        ])
        .split(frame.area());

    let title = Line::from(vec![
        Span::styled(
            " Nimbus ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled("current weather", Style::default().fg(Color::DarkGray)),
    ]);
    frame.render_widget(Paragraph::new(title), chunks[0]);

    weather_panel::render(frame, chunks[1], &app.weather);
    search_panel::render(frame, chunks[2], app);

    let hints = match app.focus {
        Focus::Weather => " / search  l location  r refresh  ? help  q quit",
        Focus::Search => " type to search  ↑↓ choose  Enter select  Esc cancel",
    };
    frame.render_widget(
        Paragraph::new(Span::styled(hints, Style::default().fg(Color::DarkGray))),
        chunks[3],
    );

    if app.show_help {
        render_help_overlay(frame);
    }
}
