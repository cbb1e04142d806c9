//! Trip recording.
//!
//! A trip writes every valid fix to its own CSV and JSONL file under the trip
//! directory and keeps running totals for the summary shown when it ends.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::fix::GpsFix;
use super::geo::{format_coord, format_value, haversine_distance, Units};
use super::{format_timestamp, JsonlRecord};
use crate::data::duration::format_hms;
use crate::error::TripError;

pub const TRIP_CSV_HEADER: [&str; 11] = [
    "Timestamp",
    "Latitude",
    "Longitude",
    "Altitude (MSL)",
    "Speed (m/s)",
    "Heading (deg)",
    "Num SV",
    "Fix Type",
    "PDOP",
    "HDOP",
    "VDOP",
];

/// Summary kept in the trip history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripSummary {
    pub start_time: String,
    pub end_time: String,
    /// `H:MM:SS`.
    pub duration: String,
    pub distance: f64,
    pub distance_unit: String,
    pub max_speed: f64,
    pub max_speed_unit: String,
    pub csv_path: PathBuf,
    pub jsonl_path: PathBuf,
}

#[derive(Debug)]
struct ActiveTrip {
    started: DateTime<Local>,
    csv: csv::Writer<File>,
    jsonl: BufWriter<File>,
    csv_path: PathBuf,
    jsonl_path: PathBuf,
    distance_m: f64,
    max_speed_mps: f64,
    last_position: Option<(f64, f64)>,
    points: usize,
}

#[derive(Debug, Default)]
pub struct TripRecorder {
    active: Option<ActiveTrip>,
}

impl TripRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Distance so far in metres.
    pub fn distance_m(&self) -> f64 {
        self.active.as_ref().map_or(0.0, |t| t.distance_m)
    }

    pub fn max_speed_mps(&self) -> f64 {
        self.active.as_ref().map_or(0.0, |t| t.max_speed_mps)
    }

    pub fn points(&self) -> usize {
        self.active.as_ref().map_or(0, |t| t.points)
    }

    pub fn started(&self) -> Option<DateTime<Local>> {
        self.active.as_ref().map(|t| t.started)
    }

    /// Open the trip files and record `fix` as the first point.
    pub fn start(&mut self, dir: &Path, fix: &GpsFix, now: DateTime<Local>) -> Result<PathBuf, TripError> {
        if self.active.is_some() {
            return Err(TripError::AlreadyActive);
        }
        if !fix.has_position() {
            return Err(TripError::NoFix);
        }

        fs::create_dir_all(dir)?;
        let stem = format!("trip_{}", now.format("%Y%m%d_%H%M%S"));
        let csv_path = dir.join(format!("{}.csv", stem));
        let jsonl_path = dir.join(format!("{}.jsonl", stem));

        let mut csv = csv::Writer::from_path(&csv_path)?;
        csv.write_record(TRIP_CSV_HEADER)?;
        csv.flush()?;
        let jsonl = BufWriter::new(File::create(&jsonl_path)?);

        info!("Trip started, logging to {}", csv_path.display());
        self.active = Some(ActiveTrip {
            started: now,
            csv,
            jsonl,
            csv_path: csv_path.clone(),
            jsonl_path,
            distance_m: 0.0,
            max_speed_mps: 0.0,
            last_position: None,
            points: 0,
        });
        self.update(fix, now)?;
        Ok(csv_path)
    }

    /// Add a fix to the active trip. Fixes without a position are skipped.
    pub fn update(&mut self, fix: &GpsFix, now: DateTime<Local>) -> Result<(), TripError> {
        let Some(trip) = self.active.as_mut() else {
            return Ok(());
        };
        if !fix.has_position() {
            return Ok(());
        }

        if fix.ground_speed.is_finite() && fix.ground_speed > trip.max_speed_mps {
            trip.max_speed_mps = fix.ground_speed;
        }
        if let Some((lat, lon)) = trip.last_position {
            trip.distance_m += haversine_distance(lat, lon, fix.lat, fix.lon);
        }
        trip.last_position = Some((fix.lat, fix.lon));
        trip.points += 1;

        let timestamp = format_timestamp(now);
        trip.csv.write_record([
            timestamp.clone(),
            format_coord(fix.lat),
            format_coord(fix.lon),
            format_value(fix.height_msl),
            format_value(fix.ground_speed),
            format_value(fix.heading),
            fix.num_sv.to_string(),
            fix.fix_type.to_string(),
            format_value(fix.pdop),
            format_value(fix.hdop),
            format_value(fix.vdop),
        ])?;
        trip.csv.flush()?;

        let record = JsonlRecord {
            timestamp,
            data: fix.clone(),
        };
        serde_json::to_writer(&mut trip.jsonl, &record)?;
        trip.jsonl.write_all(b"\n")?;
        trip.jsonl.flush()?;
        Ok(())
    }

    /// Close the trip files and build its summary.
    pub fn end(&mut self, now: DateTime<Local>, units: Units) -> Result<TripSummary, TripError> {
        let mut trip = self.active.take().ok_or(TripError::NotActive)?;
        trip.csv.flush()?;
        trip.jsonl.flush()?;

        let seconds = (now - trip.started).num_seconds();
        let summary = TripSummary {
            start_time: trip.started.format("%Y-%m-%d %H:%M:%S").to_string(),
            end_time: now.format("%Y-%m-%d %H:%M:%S").to_string(),
            duration: format_hms(seconds),
            distance: round2(units.distance(trip.distance_m)),
            distance_unit: units.distance_unit().to_string(),
            max_speed: round2(units.trip_speed(trip.max_speed_mps)),
            max_speed_unit: units.trip_speed_unit().to_string(),
            csv_path: trip.csv_path,
            jsonl_path: trip.jsonl_path,
        };
        debug!(points = trip.points, "Trip ended: {:?}", summary);
        Ok(summary)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
