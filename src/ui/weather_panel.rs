//! Weather panel rendering
//!
//! Shows whatever the weather state machine currently holds: a prompt, a
//! loading line, the current conditions, or the failure message.

use chrono::{DateTime, Local, Utc};
use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::cache::Asset;
use crate::data::temperature::{describe, format_celsius, format_range};
use crate::data::WeatherSnapshot;
use crate::orchestrator::WeatherState;

/// Color for temperature (warmer = more red, cooler = more blue)
fn temperature_color(temp: f64) -> Color {
    if temp >= 30.0 {
        Color::Red
    } else if temp >= 25.0 {
        Color::LightRed
    } else if temp >= 20.0 {
        Color::Yellow
    } else if temp >= 10.0 {
        Color::Green
    } else if temp >= 0.0 {
        Color::Cyan
    } else {
        Color::Blue
    }
}

fn local_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.with_timezone(&Local).format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string())
}

fn icon_status(code: &str, icon: Option<&Asset>) -> String {
    match icon {
        Some(asset) => format!("{} ({} bytes)", code, asset.len()),
        None => format!("{} (not loaded)", code),
    }
}

fn detail_line(label: &str, value: String) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{:<12}", label), Style::default().fg(Color::DarkGray)),
        Span::raw(value),
    ])
}

fn snapshot_lines(snapshot: &WeatherSnapshot, icon: Option<&Asset>) -> Vec<Line<'static>> {
    let title = if snapshot.country.is_empty() {
        snapshot.city_name.clone()
    } else {
        format!("{}, {}", snapshot.city_name, snapshot.country)
    };

    vec![
        Line::from(Span::styled(
            title,
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled(
                format_celsius(snapshot.temperature),
                Style::default()
                    .fg(temperature_color(snapshot.temperature))
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!("  {}  ", describe(snapshot.temperature))),
            Span::raw(snapshot.description.clone()),
        ]),
        Line::from(""),
        detail_line("Feels like", format_celsius(snapshot.feels_like)),
        detail_line("Range", format_range(snapshot.temp_min, snapshot.temp_max)),
        detail_line("Humidity", format!("{}%", snapshot.humidity)),
        detail_line("Pressure", format!("{} hPa", snapshot.pressure)),
        detail_line("Wind", format!("{:.1} m/s", snapshot.wind_speed)),
        detail_line("Visibility", format!("{:.1} km", snapshot.visibility as f64 / 1000.0)),
        detail_line("Clouds", format!("{}%", snapshot.cloudiness)),
        detail_line(
            "Sun",
            format!("{} / {}", local_time(snapshot.sunrise), local_time(snapshot.sunset)),
        ),
        detail_line("Icon", icon_status(&snapshot.icon_code, icon)),
        Line::from(""),
        Line::from(Span::styled(
            format!(
                "Updated {}",
                snapshot.fetched_at.with_timezone(&Local).format("%H:%M:%S")
            ),
            Style::default().fg(Color::DarkGray),
        )),
    ]
}

/// Renders the weather panel into `area`
pub fn render(frame: &mut Frame, area: Rect, state: &WeatherState) {
    let lines = match state {
        WeatherState::Idle => vec![
            Line::from("No city selected."),
            Line::from(""),
            Line::from(Span::styled(
                "Press / to search for a city or l to use your location.",
                Style::default().fg(Color::DarkGray),
            )),
        ],
        WeatherState::Loading => vec![Line::from(Span::styled(
            "Loading weather...",
            Style::default().fg(Color::Cyan),
        ))],
        WeatherState::Ready { snapshot, icon } => snapshot_lines(snapshot, icon.as_ref()),
        WeatherState::Failed(message) => vec![
            Line::from(Span::styled(message.clone(), Style::default().fg(Color::Red))),
            Line::from(""),
            Line::from(Span::styled(
                "Press r to try again.",
                Style::default().fg(Color::DarkGray),
            )),
        ],
    };

    let block = Block::default()
        .title(" Weather ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let paragraph = Paragraph::new(lines)
        .block(block)
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: true });

    frame.render_widget(paragraph, area);
}
