//! Live GPS view: fix details, satellites in view and raw NMEA.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};

use super::render_sparkline;
use crate::app::App;
use crate::gps::geo::{format_coord, format_value};
use crate::gps::{GpsFix, Units};

const SNR_BAR_WIDTH: usize = 10;
/// Highest SNR drawn as a full bar, dB-Hz.
const SNR_FULL: f64 = 50.0;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let rows = Layout::vertical([Constraint::Min(10), Constraint::Length(8)]).split(area);
    let top = Layout::horizontal([Constraint::Percentage(45), Constraint::Percentage(55)]).split(rows[0]);
    let bottom = Layout::horizontal([Constraint::Percentage(45), Constraint::Percentage(55)]).split(rows[1]);

    render_fix(frame, app, top[0]);
    render_satellites(frame, app, top[1]);
    render_trend(frame, app, bottom[0]);
    render_nmea(frame, app, bottom[1]);
}

fn block<'a>(app: &App, title: &'a str) -> Block<'a> {
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.frame))
}

/// Label / value pairs for the fix panel.
pub fn fix_fields(fix: &GpsFix, units: Units) -> Vec<(&'static str, String)> {
    vec![
        (
            "Time (UTC)",
            fix.time
                .map_or_else(|| "N/A".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S%.3f").to_string()),
        ),
        ("Latitude", format_coord(fix.lat)),
        ("Longitude", format_coord(fix.lon)),
        ("Altitude", units.format_altitude(fix.height_msl)),
        ("Speed", units.format_speed(fix.ground_speed)),
        ("Heading", format_heading(fix.heading)),
        ("Fix", fix.fix_type_label().to_string()),
        ("RTK", fix.carrier_solution_label().to_string()),
        ("Satellites", fix.num_sv.to_string()),
        ("H / V acc (m)", format!("{} / {}", format_value(fix.h_acc), format_value(fix.v_acc))),
        (
            "P / H / V DOP",
            format!(
                "{} / {} / {}",
                format_value(fix.pdop),
                format_value(fix.hdop),
                format_value(fix.vdop)
            ),
        ),
        ("Diff age (s)", format_value(fix.diff_age)),
    ]
}

fn format_heading(degrees: f64) -> String {
    if degrees.is_finite() {
        format!("{:.1}°", degrees)
    } else {
        "N/A".to_string()
    }
}

fn render_fix(frame: &mut Frame, app: &App, area: Rect) {
    let Some(fix) = app.gps.current() else {
        let waiting = Paragraph::new("Waiting for GPS data...")
            .style(Style::default().add_modifier(Modifier::DIM))
            .block(block(app, " Position "));
        frame.render_widget(waiting, area);
        return;
    };

    let mut lines: Vec<Line> = fix_fields(fix, app.gps.units())
        .into_iter()
        .map(|(label, value)| {
            Line::from(vec![
                Span::styled(format!("{:<15}", label), Style::default().add_modifier(Modifier::DIM)),
                Span::raw(value),
            ])
        })
        .collect();

    let trip = app.gps.trip();
    if trip.is_active() {
        let units = app.gps.units();
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled("Trip           ", app.theme.recording()),
            Span::raw(format!(
                "{}  max {}",
                units.format_distance(trip.distance_m()),
                units.format_speed(trip.max_speed_mps())
            )),
        ]));
    }

    frame.render_widget(Paragraph::new(lines).block(block(app, " Position ")), area);
}

fn render_satellites(frame: &mut Frame, app: &App, area: Rect) {
    let satellites = app.gps.current().map(|f| f.satellites.as_slice()).unwrap_or_default();

    let rows: Vec<Row> = satellites
        .iter()
        .map(|sat| {
            let snr = sat.snr.map_or(0.0, f64::from);
            let filled = ((snr / SNR_FULL).clamp(0.0, 1.0) * SNR_BAR_WIDTH as f64).round() as usize;
            Row::new(vec![
                Cell::from(sat.system.clone()),
                Cell::from(sat.prn.to_string()),
                Cell::from(sat.elevation.map_or("-".to_string(), |e| format!("{}°", e))),
                Cell::from(sat.azimuth.map_or("-".to_string(), |a| format!("{}°", a))),
                Cell::from(sat.snr.map_or("-".to_string(), |s| s.to_string())),
                Cell::from("█".repeat(filled)).style(app.theme.snr_style(sat.snr)),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(4),
        Constraint::Length(5),
        Constraint::Length(6),
        Constraint::Length(6),
        Constraint::Length(5),
        Constraint::Fill(1),
    ];
    let title = format!(" Satellites in view ({}) ", satellites.len());
    let table = Table::new(rows, widths)
        .header(Row::new(vec!["Sys", "PRN", "Elev", "Az", "SNR", ""]).style(app.theme.header))
        .block(block(app, &title));
    frame.render_widget(table, area);
}

fn render_trend(frame: &mut Frame, app: &App, area: Rect) {
    let width = area.width.saturating_sub(14) as usize;
    let units = app.gps.units();
    let speeds: Vec<f64> = app.gps.trend().map(|p| p.speed).collect();
    let altitudes: Vec<f64> = app.gps.trend().map(|p| p.altitude).collect();
    let satellites: Vec<f64> = app.gps.trend().map(|p| f64::from(p.num_sv)).collect();

    let line = |label: &str, values: &[f64]| {
        Line::from(vec![
            Span::styled(format!("{:<12}", label), Style::default().add_modifier(Modifier::DIM)),
            Span::styled(
                render_sparkline(&levels(values, width)),
                Style::default().fg(app.theme.accent),
            ),
        ])
    };
    let lines = vec![
        line(&format!("Speed {}", units.speed_unit()), &speeds),
        line(&format!("Alt {}", units.altitude_unit()), &altitudes),
        line("Satellites", &satellites),
    ];
    frame.render_widget(Paragraph::new(lines).block(block(app, " Trends ")), area);
}

/// Last `width` finite values scaled to 0-7.
fn levels(values: &[f64], width: usize) -> Vec<u8> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let tail = &finite[finite.len().saturating_sub(width)..];
    if tail.len() < 2 {
        return Vec::new();
    }
    let min = tail.iter().copied().fold(f64::INFINITY, f64::min);
    let max = tail.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    tail.iter()
        .map(|&v| {
            if range <= f64::EPSILON {
                3
            } else {
                (((v - min) / range) * 7.0).round() as u8
            }
        })
        .collect()
}

fn render_nmea(frame: &mut Frame, app: &App, area: Rect) {
    let visible = area.height.saturating_sub(2) as usize;
    let mut lines: Vec<Line> = app
        .gps
        .nmea_lines()
        .rev()
        .take(visible)
        .map(|l| Line::from(l.as_str()))
        .collect();
    lines.reverse();
    let paragraph = Paragraph::new(lines)
        .style(Style::default().add_modifier(Modifier::DIM))
        .block(block(app, " NMEA "));
    frame.render_widget(paragraph, area);
}
