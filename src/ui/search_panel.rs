//! Search box and results list rendering

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::app::{App, Focus};
use crate::orchestrator::SearchState;

/// Renders the search input and, below it, the search results
pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let focused = app.focus == Focus::Search;
    let border_color = if focused { Color::Yellow } else { Color::DarkGray };

    let mut input = vec![Span::raw(app.query.clone())];
    if focused {
        input.push(Span::styled("_", Style::default().fg(Color::Yellow)));
    }
    let input_box = Paragraph::new(Line::from(input)).block(
        Block::default()
            .title(" Search city ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border_color)),
    );
    frame.render_widget(input_box, chunks[0]);

    let lines: Vec<Line> = match &app.search {
        SearchState::Idle => vec![Line::from(Span::styled(
            if focused {
                "Type at least two letters."
            } else {
                "Press / to search."
            },
            Style::default().fg(Color::DarkGray),
        ))],
        SearchState::Searching => vec![Line::from(Span::styled(
            "Searching...",
            Style::default().fg(Color::Cyan),
        ))],
        SearchState::Results(results) => results
            .iter()
            .enumerate()
            .map(|(i, city)| {
                if i == app.selected_result {
                    Line::from(Span::styled(
                        format!("> {}", city.display_name()),
                        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                    ))
                } else {
                    Line::from(format!("  {}", city.display_name()))
                }
            })
            .collect(),
        SearchState::Failed(message) => vec![Line::from(Span::styled(
            message.clone(),
            Style::default().fg(Color::Red),
        ))],
    };

    let results = Paragraph::new(lines).block(
        Block::default()
            .title(" Results ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    frame.render_widget(results, chunks[1]);
}
