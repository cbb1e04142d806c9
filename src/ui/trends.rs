//! Trend chart for one sensor metric.

use chrono::Local;
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, List, ListItem, ListState, Paragraph},
    Frame,
};

use crate::app::App;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::horizontal([Constraint::Length(24), Constraint::Min(20)]).split(area);
    let kind = app.selected_sensor_kind();
    let metrics = kind.metrics();
    let selected = app.selected_metric.min(metrics.len().saturating_sub(1));

    let items: Vec<ListItem> = metrics
        .iter()
        .map(|m| ListItem::new(format!("{} ({})", m.label, m.unit)))
        .collect();
    let list = List::new(items)
        .block(
            Block::default()
                .title(format!(" {} ", kind.display_name()))
                .borders(Borders::ALL)
                .border_type(app.theme.border_type)
                .border_style(Style::default().fg(app.theme.frame)),
        )
        .highlight_style(app.theme.selected)
        .highlight_symbol("▶ ");
    let mut state = ListState::default().with_selected(Some(selected));
    frame.render_stateful_widget(list, chunks[0], &mut state);

    let Some(metric) = metrics.get(selected) else {
        return;
    };
    let range = app.settings.sensors.plot_time_range;
    let now = Local::now();
    let data = app.history.series(kind, metric.key, range, now);

    let title = Line::from(vec![
        Span::styled(format!(" {} ", metric.label), app.theme.header),
        Span::raw(format!("│ {} ", range.label())),
    ]);
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.frame));

    if data.len() < 2 {
        let message = Paragraph::new("Not enough data in this time range")
            .style(Style::default().add_modifier(Modifier::DIM))
            .block(block);
        frame.render_widget(message, chunks[1]);
        return;
    }

    let x_min = data.first().map_or(0.0, |p| p.0);
    let (mut y_min, mut y_max) = data
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| (lo.min(p.1), hi.max(p.1)));
    if (y_max - y_min).abs() < f64::EPSILON {
        y_min -= 1.0;
        y_max += 1.0;
    }
    let pad = (y_max - y_min) * 0.05;
    let (y_min, y_max) = (y_min - pad, y_max + pad);

    let x_labels = vec![
        format!("{:.0}s", x_min),
        format!("{:.0}s", x_min / 2.0),
        "now".to_string(),
    ];
    let y_labels = vec![
        metric.format(y_min),
        metric.format((y_min + y_max) / 2.0),
        metric.format(y_max),
    ];

    let datasets = vec![Dataset::default()
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(app.theme.sensor_color(kind)))
        .data(&data)];

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .bounds([x_min, 0.0])
                .labels(x_labels)
                .style(Style::default().fg(app.theme.frame)),
        )
        .y_axis(
            Axis::default()
                .bounds([y_min, y_max])
                .labels(y_labels)
                .style(Style::default().fg(app.theme.frame)),
        );
    frame.render_widget(chart, chunks[1]);
}
