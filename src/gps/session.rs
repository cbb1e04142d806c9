//! Per-run GPS state shared by the dashboard views.
//!
//! [`GpsSession`] is owned by the UI thread. Every fix (live or replayed) goes
//! through [`GpsSession::process`], which updates the current position, the
//! track and trend buffers, the active trip and the geofence state. Live fixes
//! are also written to the GPS logs.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::SystemTime;

use chrono::{DateTime, Local};
use tracing::debug;

use super::fix::GpsFix;
use super::geo::Units;
use super::geofence::{Geofence, GeofenceEvent, GeofenceMonitor};
use super::logger::GpsLogger;
use super::trip::{TripRecorder, TripSummary};
use crate::data::{Notice, StatusLevel};
use crate::error::TripError;
use crate::settings::GpsSettings;

/// Housekeeping runs once per this many processed fixes.
pub const MAINTENANCE_EVERY: u64 = 100;

/// One sample of the trend charts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendPoint {
    pub timestamp: DateTime<Local>,
    /// m/s
    pub speed: f64,
    /// metres MSL
    pub altitude: f64,
    pub num_sv: u32,
    pub hdop: f64,
}

#[derive(Debug)]
pub struct GpsSession {
    settings: GpsSettings,
    current: Option<GpsFix>,
    track: VecDeque<(f64, f64)>,
    trend: VecDeque<TrendPoint>,
    nmea: VecDeque<String>,
    trip: TripRecorder,
    geofences: GeofenceMonitor,
    logger: GpsLogger,
    processed: u64,
    low_space: bool,
}

impl GpsSession {
    pub fn new(settings: &GpsSettings) -> Self {
        Self {
            settings: settings.clone(),
            current: None,
            track: VecDeque::new(),
            trend: VecDeque::new(),
            nmea: VecDeque::new(),
            trip: TripRecorder::new(),
            geofences: GeofenceMonitor::new(),
            logger: GpsLogger::new(settings),
            processed: 0,
            low_space: false,
        }
    }

    pub fn settings(&self) -> &GpsSettings {
        &self.settings
    }

    pub fn current(&self) -> Option<&GpsFix> {
        self.current.as_ref()
    }

    pub fn track(&self) -> impl Iterator<Item = &(f64, f64)> {
        self.track.iter()
    }

    pub fn trend(&self) -> impl Iterator<Item = &TrendPoint> {
        self.trend.iter()
    }

    pub fn nmea_lines(&self) -> impl DoubleEndedIterator<Item = &String> {
        self.nmea.iter()
    }

    pub fn trip(&self) -> &TripRecorder {
        &self.trip
    }

    pub fn current_geofence(&self) -> Option<&str> {
        self.geofences.current()
    }

    pub fn units(&self) -> Units {
        self.settings.unit_preference
    }

    pub fn toggle_units(&mut self) -> Units {
        self.settings.unit_preference = self.settings.unit_preference.toggle();
        self.settings.unit_preference
    }

    /// Record a raw sentence for the NMEA view and log.
    pub fn push_nmea(&mut self, line: String) -> Option<Notice> {
        let result = self.logger.log_nmea(&line);
        push_bounded(&mut self.nmea, line, self.settings.max_nmea_lines);
        result
            .err()
            .map(|e| (StatusLevel::Danger, format!("Error writing NMEA log: {}", e)))
    }

    /// Apply a live fix and log it.
    pub fn process(&mut self, fix: GpsFix, now: DateTime<Local>) -> Vec<Notice> {
        let mut notices = Vec::new();
        if let Err(e) = self.logger.log_fix(&fix, now) {
            notices.push((StatusLevel::Danger, format!("Error writing GPS log: {}", e)));
        }
        notices.extend(self.apply(fix, now));

        self.processed += 1;
        if self.processed % MAINTENANCE_EVERY == 0 {
            notices.extend(self.maintenance());
        }
        notices
    }

    /// Apply a replayed fix. Replays are not written to the GPS logs.
    pub fn process_replay(&mut self, fix: GpsFix, now: DateTime<Local>) -> Vec<Notice> {
        self.apply(fix, now)
    }

    fn apply(&mut self, fix: GpsFix, now: DateTime<Local>) -> Vec<Notice> {
        let mut notices = Vec::new();
        let limit = self.settings.max_trend_points;

        if fix.has_position() {
            push_bounded(&mut self.track, (fix.lat, fix.lon), limit);
        }
        push_bounded(
            &mut self.trend,
            TrendPoint {
                timestamp: now,
                speed: fix.ground_speed,
                altitude: fix.height_msl,
                num_sv: fix.num_sv,
                hdop: fix.hdop,
            },
            limit,
        );

        if let Err(e) = self.trip.update(&fix, now) {
            notices.push((StatusLevel::Danger, format!("Error writing trip log: {}", e)));
        }

        for event in self.geofences.check(&self.settings.geofences, fix.lat, fix.lon) {
            notices.push(match event {
                GeofenceEvent::Entered(name) => (StatusLevel::Info, format!("Entered geofence: {}", name)),
                GeofenceEvent::Exited(name) => (StatusLevel::Info, format!("Exited geofence: {}", name)),
            });
        }

        self.current = Some(fix);
        notices
    }

    fn maintenance(&mut self) -> Vec<Notice> {
        let mut notices = Vec::new();
        let removed = self.logger.clean_old_logs(SystemTime::now());
        if removed > 0 {
            notices.push((StatusLevel::Info, format!("Removed {} old GPS log file(s)", removed)));
        }

        let low = self.logger.is_low_on_space();
        if low && !self.low_space {
            notices.push((
                StatusLevel::Warning,
                format!("Low disk space: less than {} MB free", self.settings.min_disk_space_mb),
            ));
        }
        self.low_space = low;
        debug!(processed = self.processed, "GPS maintenance done");
        notices
    }

    /// Start a trip at the current position.
    pub fn start_trip(&mut self, now: DateTime<Local>) -> Result<PathBuf, TripError> {
        let fix = self.current.as_ref().ok_or(TripError::NoFix)?;
        self.trip.start(&self.settings.trip_log_dir, fix, now)
    }

    /// End the trip and append its summary to the trip history.
    pub fn end_trip(&mut self, now: DateTime<Local>) -> Result<TripSummary, TripError> {
        let summary = self.trip.end(now, self.settings.unit_preference)?;
        self.settings.trip_history.push(summary.clone());
        Ok(summary)
    }

    /// Add a fence centred on the current position.
    pub fn add_geofence_here(&mut self, name: impl Into<String>, radius: f64) -> Result<&Geofence, TripError> {
        let (lat, lon) = match &self.current {
            Some(fix) if fix.has_position() => (fix.lat, fix.lon),
            _ => return Err(TripError::NoFix),
        };
        self.settings.geofences.push(Geofence::new(name, lat, lon, radius));
        self.geofences.reset();
        self.settings.geofences.last().ok_or(TripError::NoFix)
    }

    pub fn close(&mut self) {
        self.logger.close_all();
    }
}

fn push_bounded<T>(buffer: &mut VecDeque<T>, value: T, limit: usize) {
    buffer.push_back(value);
    while buffer.len() > limit.max(1) {
        buffer.pop_front();
    }
}
