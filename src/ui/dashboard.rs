//! Sensor dashboard: one panel per sensor with the latest values.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Row, Table},
    Frame,
};

use super::render_sparkline;
use crate::app::App;
use crate::data::{MetricInfo, SensorKind};

const GAUGE_WIDTH: usize = 12;
const TREND_WIDTH: usize = 12;

/// Render the Dashboard view as a 2x2 grid of sensor panels.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let rows = Layout::vertical([Constraint::Percentage(60), Constraint::Percentage(40)]).split(area);
    let top = Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)]).split(rows[0]);
    let bottom = Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)]).split(rows[1]);

    // BME280 has the most metrics and gets the tall panel
    let cells = [top[0], bottom[0], top[1], bottom[1]];
    for (i, (kind, cell)) in SensorKind::ALL.iter().zip(cells).enumerate() {
        render_sensor(frame, app, *kind, i == app.selected_sensor, cell);
    }
}

fn render_sensor(frame: &mut Frame, app: &App, kind: SensorKind, selected: bool, area: Rect) {
    let reading = app.latest_reading();

    let rows: Vec<Row> = kind
        .metrics()
        .iter()
        .map(|metric| {
            let value = reading.map_or(f64::NAN, |r| r.value(kind, metric.key));
            let style = app.theme.status_style(metric.health(value));
            let trend = render_sparkline(&app.history.sparkline(kind, metric.key, TREND_WIDTH));
            Row::new(vec![
                Cell::from(metric.label),
                Cell::from(Line::from(vec![
                    Span::styled(metric.format(value), style),
                    Span::raw(format!(" {}", metric.unit)),
                ])),
                Cell::from(gauge_bar(metric, value)).style(Style::default().fg(app.theme.gauge)),
                Cell::from(trend).style(Style::default().add_modifier(Modifier::DIM)),
            ])
        })
        .collect();

    let border_style = app.theme.panel_border(selected);
    let title = if app.settings.sensors.logs_sensor(kind) {
        format!(" {} ", kind.display_name())
    } else {
        format!(" {} (not logged) ", kind.display_name())
    };

    let widths = [
        Constraint::Length(12),
        Constraint::Length(14),
        Constraint::Length(GAUGE_WIDTH as u16 + 2),
        Constraint::Fill(1),
    ];
    let table = Table::new(rows, widths)
        .header(Row::new(vec!["Metric", "Value", "Range", "Trend"]).style(app.theme.header))
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_type(app.theme.border_type)
                .border_style(border_style),
        );
    frame.render_widget(table, area);
}

/// Text gauge of where `value` sits in the metric's display range.
fn gauge_bar(metric: &MetricInfo, value: f64) -> String {
    if !value.is_finite() {
        return format!("[{}]", " ".repeat(GAUGE_WIDTH));
    }
    let filled = (metric.gauge_ratio(value) * GAUGE_WIDTH as f64).round() as usize;
    format!("[{}{}]", "█".repeat(filled), "·".repeat(GAUGE_WIDTH - filled))
}
