//! Trips view: recording state, playback, trip history and the analysis
//! overlay.

use chrono::Local;
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState},
    Frame,
};

use super::centered_rect;
use crate::app::App;
use crate::data::duration::format_hms;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let rows = Layout::vertical([Constraint::Length(6), Constraint::Min(5)]).split(area);
    let top = Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)]).split(rows[0]);

    render_recording(frame, app, top[0]);
    render_playback(frame, app, top[1]);
    render_history(frame, app, rows[1]);
}

fn panel<'a>(app: &App, title: &'a str) -> Block<'a> {
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.frame))
}

fn render_recording(frame: &mut Frame, app: &App, area: Rect) {
    let trip = app.gps.trip();
    let units = app.gps.units();
    let lines = match trip.started() {
        Some(started) => vec![
            Line::from(Span::styled("● Recording", app.theme.recording())),
            Line::from(format!(
                "Elapsed {}  Points {}",
                format_hms((Local::now() - started).num_seconds()),
                trip.points()
            )),
            Line::from(format!(
                "Distance {}  Max {}",
                units.format_distance(trip.distance_m()),
                units.format_speed(trip.max_speed_mps())
            )),
        ],
        None => vec![
            Line::from("No trip in progress"),
            Line::from(Span::styled(
                "s: start at current position",
                Style::default().add_modifier(Modifier::DIM),
            )),
        ],
    };
    frame.render_widget(Paragraph::new(lines).block(panel(app, " Trip ")), area);
}

fn render_playback(frame: &mut Frame, app: &App, area: Rect) {
    let lines = match &app.playback {
        Some(playback) => vec![
            Line::from(format!(
                "{}  {}",
                playback.state().label(),
                playback.progress()
            )),
            Line::from(format!("Speed {:.1}x", playback.speed())),
            Line::from(Span::styled(
                playback
                    .file()
                    .map_or_else(String::new, |p| p.display().to_string()),
                Style::default().add_modifier(Modifier::DIM),
            )),
        ],
        None => vec![Line::from(Span::styled(
            "No playback file (set gps.playback_file)",
            Style::default().add_modifier(Modifier::DIM),
        ))],
    };
    frame.render_widget(Paragraph::new(lines).block(panel(app, " Playback ")), area);
}

fn render_history(frame: &mut Frame, app: &App, area: Rect) {
    let history = &app.gps.settings().trip_history;
    let rows: Vec<Row> = history
        .iter()
        .map(|trip| {
            Row::new(vec![
                Cell::from(trip.start_time.clone()),
                Cell::from(trip.duration.clone()),
                Cell::from(format!("{:.2} {}", trip.distance, trip.distance_unit)),
                Cell::from(format!("{:.2} {}", trip.max_speed, trip.max_speed_unit)),
                Cell::from(trip.csv_path.display().to_string()),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(20),
        Constraint::Length(9),
        Constraint::Length(14),
        Constraint::Length(14),
        Constraint::Fill(1),
    ];
    let title = format!(" Trip history ({}) ", history.len());
    let table = Table::new(rows, widths)
        .header(Row::new(vec!["Start", "Duration", "Distance", "Max speed", "File"]).style(app.theme.header))
        .block(panel(app, &title))
        .row_highlight_style(app.theme.selected);

    let mut state = TableState::default();
    if !history.is_empty() {
        state.select(Some(app.selected_trip.min(history.len() - 1)));
    }
    frame.render_stateful_widget(table, area, &mut state);
}

/// Modal with the analysis of the selected trip.
pub fn render_analysis(frame: &mut Frame, app: &App, area: Rect) {
    let Some((path, analysis)) = &app.analysis else {
        return;
    };

    let mut lines = vec![
        Line::from(Span::styled("Trip Analysis", app.theme.header)),
        Line::from(Span::styled(
            path.file_name().map_or_else(String::new, |n| n.to_string_lossy().into_owned()),
            Style::default().add_modifier(Modifier::DIM),
        )),
        Line::from(""),
    ];
    for (label, value) in analysis.describe(app.gps.units()) {
        lines.push(Line::from(vec![
            Span::styled(format!("{:<24}", label), Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(value),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Esc to close",
        Style::default().add_modifier(Modifier::DIM),
    )));

    let block = Block::default()
        .title(" Analysis ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.accent));
    let overlay = centered_rect(48, 15, area);
    frame.render_widget(Clear, overlay);
    frame.render_widget(Paragraph::new(lines).block(block), overlay);
}
