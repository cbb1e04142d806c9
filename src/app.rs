//! Application state and navigation logic.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Local;
use tracing::{info, warn};

use crate::data::{History, Notice, Reading, SensorKind, StatusLevel, StatusMessage, TimeRange};
use crate::gps::{analyze_file, GpsReader, GpsSession, PlaybackManager, PlaybackState, TripAnalysis};
use crate::poller::{Control, PollerHandle};
use crate::settings::Settings;
use crate::source::{DataSource, Message};
use crate::ui::Theme;

/// How many status messages the Events view keeps.
pub const MAX_EVENTS: usize = 500;
/// Radius of a geofence added at the current position, metres.
pub const DEFAULT_GEOFENCE_RADIUS: f64 = 100.0;
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Which dashboard is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Sensors,
    Gps,
}

impl Mode {
    /// Tabs shown in this mode, in order.
    pub fn views(&self) -> [View; 3] {
        match self {
            Mode::Sensors => [View::Dashboard, View::Trends, View::Events],
            Mode::Gps => [View::Gps, View::Trips, View::Events],
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Mode::Sensors => "QWIIC SENSORS",
            Mode::Gps => "GPS",
        }
    }
}

/// The current view/tab in the TUI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Latest value of every sensor metric.
    Dashboard,
    /// Chart of one metric over the selected time range.
    Trends,
    /// Live fix, satellites and raw NMEA.
    Gps,
    /// Trip recording, history and playback.
    Trips,
    /// Status message log.
    Events,
}

impl View {
    /// Returns the display label for this view.
    pub fn label(&self) -> &'static str {
        match self {
            View::Dashboard => "Dashboard",
            View::Trends => "Trends",
            View::Gps => "GPS",
            View::Trips => "Trips",
            View::Events => "Events",
        }
    }
}

/// Main application state.
pub struct App {
    pub running: bool,
    pub mode: Mode,
    pub current_view: View,
    pub show_help: bool,
    /// Result of the last trip analysis, shown as an overlay.
    pub analysis: Option<(PathBuf, TripAnalysis)>,

    source: Box<dyn DataSource>,
    pub settings: Settings,
    settings_path: PathBuf,

    // Sensors
    pub history: History,
    pub selected_sensor: usize,
    pub selected_metric: usize,
    poller: Option<PollerHandle>,

    // GPS
    pub gps: GpsSession,
    reader: Option<GpsReader>,
    pub playback: Option<PlaybackManager>,
    pub selected_trip: usize,

    pub events: VecDeque<StatusMessage>,
    pub event_scroll: usize,
    pub load_error: Option<String>,

    // UI
    pub theme: Theme,

    // Status message (temporary feedback)
    pub status_message: Option<(String, Instant)>,
}

impl App {
    /// Create an app that drains `source`. Workers are attached afterwards.
    pub fn new(mode: Mode, source: Box<dyn DataSource>, settings: Settings, settings_path: PathBuf) -> Self {
        let history = History::new(settings.sensors.max_plot_data_points);
        let gps = GpsSession::new(&settings.gps);
        Self {
            running: true,
            mode,
            current_view: mode.views()[0],
            show_help: false,
            analysis: None,
            source,
            settings,
            settings_path,
            history,
            selected_sensor: 0,
            selected_metric: 0,
            poller: None,
            gps,
            reader: None,
            playback: None,
            selected_trip: 0,
            events: VecDeque::new(),
            event_scroll: 0,
            load_error: None,
            theme: Theme::auto_detect(),
            status_message: None,
        }
    }

    pub fn attach_poller(&mut self, poller: PollerHandle) {
        self.poller = Some(poller);
    }

    pub fn attach_gps_reader(&mut self, reader: GpsReader) {
        self.reader = Some(reader);
    }

    pub fn attach_playback(&mut self, playback: PlaybackManager) {
        self.playback = Some(playback);
    }

    /// Returns a description of the current data source.
    pub fn source_description(&self) -> &str {
        match (&self.mode, &self.reader) {
            (Mode::Gps, Some(reader)) => reader.description(),
            _ => self.source.description(),
        }
    }

    /// Set a temporary status message that will be shown for a few seconds.
    pub fn set_status_message(&mut self, message: String) {
        self.status_message = Some((message, Instant::now()));
    }

    /// Get the current status message if it hasn't expired (3 seconds).
    pub fn get_status_message(&self) -> Option<&str> {
        if let Some((msg, time)) = &self.status_message {
            if time.elapsed() < Duration::from_secs(3) {
                return Some(msg);
            }
        }
        None
    }

    /// Record a status message in the Events view and flash it.
    pub fn push_event(&mut self, message: StatusMessage) {
        self.set_status_message(format!("[{}] {}", message.level.label(), message.text));
        self.events.push_back(message);
        while self.events.len() > MAX_EVENTS {
            self.events.pop_front();
        }
    }

    /// Notices raised on the UI thread are logged here, since they never
    /// pass through a sink.
    fn notify(&mut self, notices: Vec<Notice>) {
        for (level, text) in notices {
            match level {
                StatusLevel::Info | StatusLevel::Success => info!("{}", text),
                StatusLevel::Warning => warn!("{}", text),
                StatusLevel::Danger => tracing::error!("{}", text),
            }
            self.push_event(StatusMessage::new(level, text));
        }
    }

    /// Drain every queued worker message.
    ///
    /// Returns true if anything was received.
    pub fn reload_data(&mut self) -> bool {
        let mut received = false;
        while let Some(message) = self.source.poll() {
            received = true;
            self.handle_message(message);
        }
        if let Some(err) = self.source.error() {
            self.load_error = Some(err.to_string());
        }
        received
    }

    fn handle_message(&mut self, message: Message) {
        match message {
            Message::Reading(reading) => self.history.push(reading),
            Message::Status(status) => self.push_event(status),
            Message::Fix(fix) => {
                let notices = self.gps.process(fix, Local::now());
                self.notify(notices);
            }
            Message::ReplayFix(fix) => {
                let notices = self.gps.process_replay(fix, Local::now());
                self.notify(notices);
            }
            Message::Nmea(line) => {
                if let Some(notice) = self.gps.push_nmea(line) {
                    self.notify(vec![notice]);
                }
            }
        }
    }

    pub fn latest_reading(&self) -> Option<&Reading> {
        self.history.latest()
    }

    /// Switch to the next tab of the current mode.
    pub fn next_view(&mut self) {
        let views = self.mode.views();
        let idx = views.iter().position(|v| *v == self.current_view).unwrap_or(0);
        self.current_view = views[(idx + 1) % views.len()];
    }

    /// Switch to the previous tab of the current mode.
    pub fn prev_view(&mut self) {
        let views = self.mode.views();
        let idx = views.iter().position(|v| *v == self.current_view).unwrap_or(0);
        self.current_view = views[(idx + views.len() - 1) % views.len()];
    }

    /// Switch to the `n`th tab (0-based) of the current mode.
    pub fn set_view_index(&mut self, n: usize) {
        if let Some(view) = self.mode.views().get(n) {
            self.current_view = *view;
        }
    }

    pub fn selected_sensor_kind(&self) -> SensorKind {
        SensorKind::ALL[self.selected_sensor % SensorKind::ALL.len()]
    }

    /// Move the selection in the current view down.
    pub fn select_next(&mut self) {
        match self.current_view {
            View::Dashboard => {
                self.selected_sensor = (self.selected_sensor + 1).min(SensorKind::ALL.len() - 1);
                self.selected_metric = 0;
            }
            View::Trends => {
                let count = self.selected_sensor_kind().metrics().len();
                self.selected_metric = (self.selected_metric + 1).min(count.saturating_sub(1));
            }
            View::Trips => {
                let count = self.gps.settings().trip_history.len();
                self.selected_trip = (self.selected_trip + 1).min(count.saturating_sub(1));
            }
            View::Events => {
                self.event_scroll = (self.event_scroll + 1).min(self.events.len().saturating_sub(1));
            }
            View::Gps => {}
        }
    }

    /// Move the selection in the current view up.
    pub fn select_prev(&mut self) {
        match self.current_view {
            View::Dashboard => {
                self.selected_sensor = self.selected_sensor.saturating_sub(1);
                self.selected_metric = 0;
            }
            View::Trends => self.selected_metric = self.selected_metric.saturating_sub(1),
            View::Trips => self.selected_trip = self.selected_trip.saturating_sub(1),
            View::Events => self.event_scroll = self.event_scroll.saturating_sub(1),
            View::Gps => {}
        }
    }

    /// Cycle to the next sensor in the Trends view.
    pub fn next_sensor(&mut self) {
        self.selected_sensor = (self.selected_sensor + 1) % SensorKind::ALL.len();
        self.selected_metric = 0;
    }

    /// Close an overlay. Returns false when nothing was open.
    pub fn close_overlay(&mut self) -> bool {
        if self.show_help {
            self.show_help = false;
            true
        } else {
            self.analysis.take().is_some()
        }
    }

    /// Toggle the help overlay.
    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    pub fn cycle_time_range(&mut self) -> TimeRange {
        let range = self.settings.sensors.plot_time_range.next();
        self.settings.sensors.plot_time_range = range;
        self.save_settings();
        range
    }

    fn send_control(&mut self, control: Control) -> bool {
        let sent = self.poller.as_ref().is_some_and(|poller| poller.send(control));
        if !sent {
            self.set_status_message("Sensor thread is not running".to_string());
        }
        sent
    }

    pub fn archive_now(&mut self) {
        self.send_control(Control::ArchiveNow);
    }

    pub fn toggle_mock_data(&mut self) {
        let enable = !self.settings.sensors.mock_data_enabled;
        if self.send_control(Control::SetMockData(enable)) {
            self.settings.sensors.mock_data_enabled = enable;
            self.save_settings();
        }
    }

    /// Change the read interval by `delta` seconds, never below one.
    pub fn adjust_read_interval(&mut self, delta: i64) {
        let current = self.settings.sensors.read_interval_secs as i64;
        let secs = (current + delta).max(1) as u64;
        if secs != self.settings.sensors.read_interval_secs && self.send_control(Control::UpdateReadInterval(secs)) {
            self.settings.sensors.read_interval_secs = secs;
            self.save_settings();
        }
    }

    pub fn start_trip(&mut self) {
        let notice = match self.gps.start_trip(Local::now()) {
            Ok(path) => (StatusLevel::Success, format!("Trip started: {}", path.display())),
            Err(e) => (StatusLevel::Warning, format!("Cannot start trip: {}", e)),
        };
        self.notify(vec![notice]);
    }

    pub fn end_trip(&mut self) {
        let notice = match self.gps.end_trip(Local::now()) {
            Ok(summary) => {
                self.selected_trip = self.gps.settings().trip_history.len().saturating_sub(1);
                self.save_settings();
                (
                    StatusLevel::Success,
                    format!(
                        "Trip ended: {} {}, {}",
                        summary.distance, summary.distance_unit, summary.duration
                    ),
                )
            }
            Err(e) => (StatusLevel::Warning, format!("Cannot end trip: {}", e)),
        };
        self.notify(vec![notice]);
    }

    pub fn add_geofence_here(&mut self) {
        let name = format!("Geofence {}", self.gps.settings().geofences.len() + 1);
        let notice = match self.gps.add_geofence_here(name, DEFAULT_GEOFENCE_RADIUS) {
            Ok(fence) => (
                StatusLevel::Success,
                format!("Added {} ({:.0} m)", fence.name, fence.radius),
            ),
            Err(e) => (StatusLevel::Warning, format!("Cannot add geofence: {}", e)),
        };
        if notice.0 == StatusLevel::Success {
            self.save_settings();
        }
        self.notify(vec![notice]);
    }

    pub fn toggle_units(&mut self) {
        let units = self.gps.toggle_units();
        self.save_settings();
        self.set_status_message(format!("Units: {:?}", units));
    }

    /// Play or pause the loaded track.
    pub fn toggle_playback(&mut self) {
        let Some(playback) = self.playback.as_mut() else {
            self.set_status_message("No playback file loaded".to_string());
            return;
        };
        if playback.state() == PlaybackState::Playing {
            playback.pause();
        } else if !playback.play() {
            self.set_status_message("Nothing to play".to_string());
        }
    }

    pub fn stop_playback(&mut self) {
        if let Some(playback) = self.playback.as_mut() {
            playback.stop();
            self.set_status_message("Playback stopped".to_string());
        }
    }

    pub fn adjust_playback_speed(&mut self, factor: f64) {
        if let Some(playback) = self.playback.as_mut() {
            playback.set_speed(playback.speed() * factor);
            let speed = playback.speed();
            self.set_status_message(format!("Playback speed {:.1}x", speed));
        }
    }

    /// Analyze the trip selected in the Trips view.
    pub fn analyze_selected_trip(&mut self) {
        let Some(trip) = self.gps.settings().trip_history.get(self.selected_trip) else {
            self.set_status_message("No trip selected".to_string());
            return;
        };
        let path = trip.csv_path.clone();
        match analyze_file(&path, &self.gps.settings().thresholds) {
            Ok(analysis) => self.analysis = Some((path, analysis)),
            Err(e) => self.notify(vec![(StatusLevel::Danger, format!("Trip analysis failed: {}", e))]),
        }
    }

    /// Persist settings, folding in the GPS session's trip history,
    /// geofences and units.
    pub fn save_settings(&mut self) {
        self.settings.gps = self.gps.settings().clone();
        if let Err(e) = self.settings.save(&self.settings_path) {
            self.notify(vec![(StatusLevel::Danger, format!("Error saving settings: {:#}", e))]);
        }
    }

    /// Signal the application to quit.
    pub fn quit(&mut self) {
        self.running = false;
    }

    /// Stop every worker, close the logs and save settings.
    pub fn shutdown(&mut self) {
        if let Some(mut poller) = self.poller.take() {
            if !poller.stop(SHUTDOWN_TIMEOUT) {
                warn!("Sensor thread still running at exit");
            }
        }
        if let Some(mut reader) = self.reader.take() {
            reader.stop(SHUTDOWN_TIMEOUT);
        }
        if let Some(mut playback) = self.playback.take() {
            playback.stop();
        }
        self.reload_data();
        self.gps.close();
        self.save_settings();
    }

    /// Export current state to a file.
    pub fn export_state(&self, path: &Path) -> Result<()> {
        use std::io::Write;

        let mut export = serde_json::Map::new();
        export.insert("exported_at".to_string(), serde_json::json!(Local::now().to_rfc3339()));

        match self.mode {
            Mode::Sensors => {
                let Some(reading) = self.latest_reading() else {
                    anyhow::bail!("No data to export");
                };
                let sensors: serde_json::Map<String, serde_json::Value> = SensorKind::ALL
                    .iter()
                    .map(|kind| {
                        let values: serde_json::Map<String, serde_json::Value> = kind
                            .metrics()
                            .iter()
                            .map(|m| {
                                let v = reading.value(*kind, m.key);
                                (m.key.to_string(), if v.is_finite() { serde_json::json!(v) } else { serde_json::Value::Null })
                            })
                            .collect();
                        (kind.name().to_string(), serde_json::Value::Object(values))
                    })
                    .collect();
                export.insert("timestamp".to_string(), serde_json::json!(reading.timestamp.to_rfc3339()));
                export.insert("readings".to_string(), serde_json::Value::Object(sensors));
                export.insert("history_points".to_string(), serde_json::json!(self.history.len()));
            }
            Mode::Gps => {
                let Some(fix) = self.gps.current() else {
                    anyhow::bail!("No data to export");
                };
                export.insert("fix".to_string(), serde_json::to_value(fix)?);
                export.insert(
                    "trip_history".to_string(),
                    serde_json::to_value(&self.gps.settings().trip_history)?,
                );
                export.insert(
                    "geofences".to_string(),
                    serde_json::to_value(&self.gps.settings().geofences)?,
                );
            }
        }

        let events: Vec<serde_json::Value> = self
            .events
            .iter()
            .rev()
            .take(50)
            .map(|e| serde_json::to_value(e).unwrap_or(serde_json::Value::Null))
            .collect();
        export.insert("recent_events".to_string(), serde_json::Value::Array(events));

        let json = serde_json::to_string_pretty(&serde_json::Value::Object(export))?;
        let mut file = std::fs::File::create(path)?;
        file.write_all(json.as_bytes())?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::{tempdir, TempDir};

    use crate::data::SensorValues;
    use crate::gps::GpsFix;
    use crate::source::{ChannelSource, MessageSink};

    fn app(mode: Mode) -> (App, MessageSink, TempDir) {
        let dir = tempdir().unwrap();
        let mut settings = Settings::default();
        settings.gps.log_dir = dir.path().join("logs");
        settings.gps.trip_log_dir = dir.path().join("logs").join("trips");
        settings.gps.min_disk_space_mb = 0;
        let (sink, source) = ChannelSource::create("test");
        let app = App::new(mode, Box::new(source), settings, dir.path().join("settings.json"));
        (app, sink, dir)
    }

    fn reading(temp: f64) -> Reading {
        let mut values = SensorValues::new();
        values.insert("bme280".to_string(), BTreeMap::from([("temp_c".to_string(), temp)]));
        Reading::new(Local::now(), values)
    }

    #[test]
    fn test_views_cycle_within_mode() {
        let (mut app, _sink, _dir) = app(Mode::Sensors);
        assert_eq!(app.current_view, View::Dashboard);
        app.next_view();
        assert_eq!(app.current_view, View::Trends);
        app.prev_view();
        app.prev_view();
        assert_eq!(app.current_view, View::Events);

        let (mut app, _sink, _dir) = self::app(Mode::Gps);
        assert_eq!(app.current_view, View::Gps);
        app.set_view_index(1);
        assert_eq!(app.current_view, View::Trips);
        app.set_view_index(7);
        assert_eq!(app.current_view, View::Trips);
    }

    #[test]
    fn test_reload_routes_messages() {
        let (mut app, sink, _dir) = app(Mode::Sensors);
        assert!(!app.reload_data());

        sink.send(Message::Reading(reading(21.5)));
        sink.status(StatusLevel::Warning, "bme280 read error");
        sink.send(Message::Fix(GpsFix {
            lat: 40.0,
            lon: -105.0,
            ..GpsFix::default()
        }));
        assert!(app.reload_data());

        assert_eq!(app.latest_reading().unwrap().value(SensorKind::Bme280, "temp_c"), 21.5);
        assert_eq!(app.events.len(), 1);
        assert_eq!(app.get_status_message(), Some("[WARN] bme280 read error"));
        assert_eq!(app.gps.current().unwrap().lat, 40.0);
    }

    #[test]
    fn test_controls_without_poller() {
        let (mut app, _sink, _dir) = app(Mode::Sensors);
        app.toggle_mock_data();
        assert!(!app.settings.sensors.mock_data_enabled);
        assert_eq!(app.get_status_message(), Some("Sensor thread is not running"));
    }

    #[test]
    fn test_time_range_saved() {
        let (mut app, _sink, dir) = app(Mode::Sensors);
        assert_eq!(app.cycle_time_range(), TimeRange::Last30Minutes);
        let saved = Settings::load(&dir.path().join("settings.json")).unwrap();
        assert_eq!(saved.sensors.plot_time_range, TimeRange::Last30Minutes);
    }

    #[test]
    fn test_trip_round_trip_updates_settings() {
        let (mut app, sink, dir) = app(Mode::Gps);
        app.start_trip();
        assert_eq!(app.events.back().unwrap().level, StatusLevel::Warning);

        for lat in [40.0, 40.001, 40.002] {
            sink.send(Message::Fix(GpsFix {
                lat,
                lon: -105.0,
                ground_speed: 5.0,
                heading: 0.0,
                ..GpsFix::default()
            }));
            app.reload_data();
            if lat == 40.0 {
                app.start_trip();
            }
        }
        app.end_trip();
        assert_eq!(app.events.back().unwrap().level, StatusLevel::Success);

        let saved = Settings::load(&dir.path().join("settings.json")).unwrap();
        assert_eq!(saved.gps.trip_history.len(), 1);

        app.analyze_selected_trip();
        let (_, analysis) = app.analysis.as_ref().unwrap();
        assert_eq!(analysis.points, 3);
        assert!(app.close_overlay());
        assert!(app.analysis.is_none());
    }

    #[test]
    fn test_export_state() {
        let (mut app, sink, dir) = app(Mode::Sensors);
        let path = dir.path().join("export.json");
        assert!(app.export_state(&path).is_err());

        sink.send(Message::Reading(reading(19.0)));
        app.reload_data();
        app.export_state(&path).unwrap();

        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["readings"]["bme280"]["temp_c"], 19.0);
        assert!(json["readings"]["sgp40"]["voc_index"].is_null());
    }

    #[test]
    fn test_events_bounded() {
        let (mut app, _sink, _dir) = app(Mode::Sensors);
        for i in 0..(MAX_EVENTS + 10) {
            app.push_event(StatusMessage::new(StatusLevel::Info, format!("event {}", i)));
        }
        assert_eq!(app.events.len(), MAX_EVENTS);
        assert_eq!(app.events.front().unwrap().text, "event 10");
    }
}
