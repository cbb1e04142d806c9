//! Common UI components shared across views.
//!
//! This module contains the header bar, tab bar, status bar, and help overlay.

use chrono::Local;
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Tabs},
    Frame,
};

use super::centered_rect;
use crate::app::{App, Mode, View};
use crate::data::{HealthStatus, SensorKind};

/// Render the header bar.
///
/// Sensors: overall health, sensors reporting, read interval, mock flag.
/// GPS: fix quality, satellites, trip and playback state.
pub fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = match app.mode {
        Mode::Sensors => sensor_header(app),
        Mode::Gps => gps_header(app),
    };
    spans.push(Span::raw(" │ "));
    spans.push(Span::styled(
        app.source_description().to_string(),
        Style::default().add_modifier(Modifier::DIM),
    ));
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn sensor_header(app: &App) -> Vec<Span<'static>> {
    let title = Span::styled(
        format!("{} ", app.mode.label()),
        Style::default().add_modifier(Modifier::BOLD),
    );
    let Some(reading) = app.latest_reading() else {
        return vec![Span::raw(" ● "), title, Span::raw("│ Waiting for data...")];
    };

    let reporting = SensorKind::ALL
        .iter()
        .filter(|kind| kind.metrics().iter().any(|m| reading.value(**kind, m.key).is_finite()))
        .count();
    let worst = SensorKind::ALL
        .iter()
        .flat_map(|kind| kind.metrics().iter().map(move |m| m.health(reading.value(*kind, m.key))))
        .max()
        .unwrap_or(HealthStatus::Healthy);
    let age = (Local::now() - reading.timestamp).num_seconds().max(0);

    let mut spans = vec![
        Span::styled(" ● ", app.theme.status_style(worst)),
        title,
        Span::raw("│ "),
        Span::styled(
            format!("{}/{}", reporting, SensorKind::ALL.len()),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(" sensors │ "),
        Span::raw(format!("every {}s", app.settings.sensors.read_interval_secs)),
        Span::raw(format!(" │ updated {}s ago", age)),
    ];
    if app.settings.sensors.mock_data_enabled {
        spans.push(Span::raw(" │ "));
        spans.push(Span::styled("MOCK", Style::default().fg(app.theme.warn)));
    }
    spans
}

fn gps_header(app: &App) -> Vec<Span<'static>> {
    let title = Span::styled(
        format!("{} ", app.mode.label()),
        Style::default().add_modifier(Modifier::BOLD),
    );
    let Some(fix) = app.gps.current() else {
        return vec![Span::raw(" ● "), title, Span::raw("│ Waiting for fix...")];
    };

    let fix_style = app.theme.fix_style(fix.fix_type);
    let mut spans = vec![
        Span::styled(" ● ", fix_style),
        title,
        Span::raw("│ "),
        Span::styled(fix.fix_type_label(), fix_style),
        Span::raw(format!(" │ {} SV", fix.num_sv)),
    ];
    if app.gps.trip().is_active() {
        spans.push(Span::raw(" │ "));
        spans.push(Span::styled("● REC", app.theme.recording()));
    }
    if let Some(fence) = app.gps.current_geofence() {
        spans.push(Span::raw(format!(" │ in {}", fence)));
    }
    if let Some(playback) = &app.playback {
        spans.push(Span::raw(format!(" │ replay {}", playback.state().label())));
    }
    spans
}

/// Render the tab bar showing available views.
///
/// Highlights the currently active view.
pub fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let views = app.mode.views();
    let titles: Vec<Line> = views
        .iter()
        .enumerate()
        .map(|(i, v)| Line::from(format!(" {}:{} ", i + 1, v.label())))
        .collect();
    let selected = views.iter().position(|v| *v == app.current_view).unwrap_or(0);

    let tabs = Tabs::new(titles)
        .select(selected)
        .style(app.theme.tab_inactive)
        .highlight_style(app.theme.tab_active)
        .divider("|");

    frame.render_widget(tabs, area);
}

/// Render the status bar at the bottom.
///
/// Shows the latest status message while it is fresh, otherwise the
/// controls for the current view.
pub fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    if let Some(msg) = app.get_status_message() {
        let paragraph = Paragraph::new(format!(" {} ", msg)).style(Style::default().fg(app.theme.accent));
        frame.render_widget(paragraph, area);
        return;
    }

    if let Some(ref err) = app.load_error {
        let paragraph = Paragraph::new(format!(" Error: {} | q:quit", err))
            .style(app.theme.status_style(HealthStatus::Critical));
        frame.render_widget(paragraph, area);
        return;
    }

    let controls = match app.current_view {
        View::Dashboard => "↑↓:sensor a:archive m:mock +/-:interval t:range ?:help q:quit",
        View::Trends => "↑↓:metric n:sensor t:range Tab:switch ?:help q:quit",
        View::Gps => "s:start trip e:end trip g:geofence u:units p:play x:stop ?:help q:quit",
        View::Trips => "↑↓:select Enter:analyze s/e:trip p:play x:stop +/-:speed ?:help q:quit",
        View::Events => "↑↓:scroll Tab:switch E:export ?:help q:quit",
    };
    let paragraph = Paragraph::new(format!(" {} | {}", app.current_view.label(), controls))
        .style(Style::default().add_modifier(Modifier::DIM));
    frame.render_widget(paragraph, area);
}

/// Render the help overlay with keyboard shortcuts.
///
/// Displayed as a centered modal on top of the current view.
pub fn render_help(frame: &mut Frame, app: &App, area: Rect) {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let mut help_text = vec![
        Line::from(vec![Span::styled("Keyboard Shortcuts", app.theme.header)]),
        Line::from(""),
        Line::from(vec![Span::styled(" Navigation", bold)]),
        Line::from("  Tab ←/→ 1-3  Switch views"),
        Line::from("  ↑/↓ j/k      Move selection"),
        Line::from("  Esc          Close overlay"),
        Line::from(""),
    ];

    match app.mode {
        Mode::Sensors => help_text.extend([
            Line::from(vec![Span::styled(" Sensors", bold)]),
            Line::from("  a         Archive logs now"),
            Line::from("  m         Toggle mock data"),
            Line::from("  + / -     Read interval ±1s"),
            Line::from("  t         Cycle time range"),
            Line::from("  n         Next sensor (Trends)"),
        ]),
        Mode::Gps => help_text.extend([
            Line::from(vec![Span::styled(" GPS", bold)]),
            Line::from("  s / e     Start / end trip"),
            Line::from("  g         Geofence at position"),
            Line::from("  u         Metric / imperial"),
            Line::from("  p / x     Play-pause / stop replay"),
            Line::from("  + / -     Replay speed"),
            Line::from("  Enter     Analyze trip (Trips)"),
        ]),
    }

    help_text.extend([
        Line::from(""),
        Line::from(vec![Span::styled(" General", bold)]),
        Line::from("  E         Export to JSON"),
        Line::from("  q         Quit"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "Press any key to close",
            Style::default().add_modifier(Modifier::DIM),
        )]),
    ]);

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.accent));

    let paragraph = Paragraph::new(help_text).block(block);
    let help_area = centered_rect(42, 24, area);

    frame.render_widget(Clear, help_area);
    frame.render_widget(paragraph, help_area);
}
