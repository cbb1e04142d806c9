//! Colours for the sensor and GPS views.
//!
//! The palette follows the terminal background (via `terminal-light`).
//! Readings are coloured by whether they sit inside their gauge range, fixes
//! by their quality, satellites by signal strength.

use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::block::BorderType;

use crate::data::{HealthStatus, SensorKind, StatusLevel};

/// Satellites at or above this SNR (dB-Hz) are drawn as strong.
pub const SNR_STRONG: u8 = 35;
/// Satellites below this SNR are drawn as weak.
pub const SNR_WEAK: u8 = 20;

#[derive(Debug, Clone)]
pub struct Theme {
    /// Titles, the focused panel and chart lines.
    pub accent: Color,
    /// Panel frames and axes.
    pub frame: Color,
    /// In-range readings, 3D fixes.
    pub ok: Color,
    /// Out-of-range readings, 2D fixes, mock mode.
    pub warn: Color,
    /// Missing readings, no fix, trip recording.
    pub alarm: Color,
    /// Gauge bar fill.
    pub gauge: Color,
    /// One line colour per sensor on the trends chart.
    pub sensor_lines: [Color; 4],
    pub header: Style,
    pub selected: Style,
    pub tab_active: Style,
    pub tab_inactive: Style,
    pub border_type: BorderType,
}

impl Theme {
    pub fn dark() -> Self {
        Self::with_accent(
            Color::Cyan,
            Color::Gray,
            Color::DarkGray,
            [Color::LightRed, Color::LightGreen, Color::LightBlue, Color::LightMagenta],
        )
    }

    pub fn light() -> Self {
        Self::with_accent(
            Color::Blue,
            Color::DarkGray,
            Color::LightBlue,
            [Color::Red, Color::Green, Color::Blue, Color::Magenta],
        )
    }

    fn with_accent(accent: Color, frame: Color, selection: Color, sensor_lines: [Color; 4]) -> Self {
        let bold = Style::default().add_modifier(Modifier::BOLD);
        Self {
            accent,
            frame,
            ok: Color::Green,
            warn: Color::Yellow,
            alarm: Color::Red,
            gauge: accent,
            sensor_lines,
            header: bold.fg(accent),
            selected: bold.bg(selection),
            tab_active: bold.fg(accent),
            tab_inactive: Style::default().fg(frame),
            border_type: BorderType::Rounded,
        }
    }

    /// Light palette on light terminals, dark otherwise (including when the
    /// background cannot be queried).
    pub fn auto_detect() -> Self {
        match terminal_light::luma() {
            Ok(luma) if luma > 0.5 => Self::light(),
            _ => Self::dark(),
        }
    }

    pub fn status_style(&self, status: HealthStatus) -> Style {
        match status {
            HealthStatus::Healthy => Style::default().fg(self.ok),
            HealthStatus::Warning => Style::default().fg(self.warn),
            HealthStatus::Critical => Style::default().fg(self.alarm).add_modifier(Modifier::BOLD),
        }
    }

    pub fn level_style(&self, level: StatusLevel) -> Style {
        match level {
            StatusLevel::Info => Style::default().fg(self.accent),
            StatusLevel::Success => Style::default().fg(self.ok),
            StatusLevel::Warning => Style::default().fg(self.warn),
            StatusLevel::Danger => Style::default().fg(self.alarm).add_modifier(Modifier::BOLD),
        }
    }

    /// u-blox fix type: 3D and GNSS+DR are good, 2D is degraded.
    pub fn fix_health(fix_type: u8) -> HealthStatus {
        match fix_type {
            3 | 4 => HealthStatus::Healthy,
            2 => HealthStatus::Warning,
            _ => HealthStatus::Critical,
        }
    }

    pub fn fix_style(&self, fix_type: u8) -> Style {
        self.status_style(Self::fix_health(fix_type))
    }

    pub fn snr_style(&self, snr: Option<u8>) -> Style {
        let health = match snr {
            Some(s) if s >= SNR_STRONG => HealthStatus::Healthy,
            Some(s) if s >= SNR_WEAK => HealthStatus::Warning,
            _ => HealthStatus::Critical,
        };
        self.status_style(health)
    }

    pub fn sensor_color(&self, kind: SensorKind) -> Color {
        let index = SensorKind::ALL.iter().position(|k| *k == kind).unwrap_or(0);
        self.sensor_lines[index % self.sensor_lines.len()]
    }

    /// Trip recording indicator.
    pub fn recording(&self) -> Style {
        Style::default().fg(self.alarm).add_modifier(Modifier::BOLD)
    }

    pub fn panel_border(&self, focused: bool) -> Style {
        Style::default().fg(if focused { self.accent } else { self.frame })
    }
}
