//! GPS data logs: raw NMEA, JSONL fixes and a CSV table.
//!
//! Each log is opened lazily on first write. A failed write drops the handle
//! so the next write tries to reopen it.

use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use super::fix::GpsFix;
use super::geo::{format_coord, format_value};
use super::{format_timestamp, JsonlRecord};
use crate::error::TripError;
use crate::logging::disk;
use crate::logging::rotating::RotatingFile;
use crate::settings::GpsSettings;

pub const NMEA_LOG_FILE: &str = "nmea_log.txt";
pub const JSONL_LOG_FILE: &str = "gps_data.jsonl";
pub const CSV_LOG_FILE: &str = "gps_data.csv";

pub const GPS_CSV_HEADER: [&str; 20] = [
    "Timestamp",
    "Latitude",
    "Longitude",
    "Altitude (MSL)",
    "Speed (m/s)",
    "Heading (deg)",
    "Num SV",
    "Fix Type",
    "Horizontal Accuracy (m)",
    "Vertical Accuracy (m)",
    "PDOP",
    "HDOP",
    "VDOP",
    "HP Latitude",
    "HP Longitude",
    "HP Height (m)",
    "Carrier Solution",
    "Differential Age",
    "RTK Age",
    "RTK Ratio",
];

#[derive(Debug)]
pub struct GpsLogger {
    settings: GpsSettings,
    nmea: Option<RotatingFile>,
    jsonl: Option<RotatingFile>,
    csv: Option<csv::Writer<File>>,
}

impl GpsLogger {
    pub fn new(settings: &GpsSettings) -> Self {
        Self {
            settings: settings.clone(),
            nmea: None,
            jsonl: None,
            csv: None,
        }
    }

    pub fn log_dir(&self) -> &Path {
        &self.settings.log_dir
    }

    /// Apply new settings; open logs are closed and reopened on demand.
    pub fn update_settings(&mut self, settings: &GpsSettings) {
        self.close_all();
        self.settings = settings.clone();
    }

    pub fn close_all(&mut self) {
        if let Some(mut csv) = self.csv.take() {
            let _ = csv.flush();
        }
        self.nmea = None;
        self.jsonl = None;
    }

    /// Append one raw NMEA sentence.
    pub fn log_nmea(&mut self, line: &str) -> std::io::Result<()> {
        if !self.settings.log_nmea {
            return Ok(());
        }
        if self.nmea.is_none() {
            self.nmea = Some(self.open_rotating(NMEA_LOG_FILE)?);
        }
        let result = match self.nmea.as_mut() {
            Some(file) => file.write_line(line.trim_end()),
            None => Ok(()),
        };
        if result.is_err() {
            self.nmea = None;
        }
        result
    }

    /// Append a fix to the JSONL and CSV logs (whichever are enabled).
    pub fn log_fix(&mut self, fix: &GpsFix, now: DateTime<Local>) -> Result<(), TripError> {
        let timestamp = format_timestamp(now);

        if self.settings.log_json {
            let result = self.write_jsonl(&timestamp, fix);
            if result.is_err() {
                self.jsonl = None;
            }
            result?;
        }

        if self.settings.log_csv {
            let result = self.write_csv(&timestamp, fix);
            if result.is_err() {
                self.csv = None;
            }
            result?;
        }
        Ok(())
    }

    fn write_jsonl(&mut self, timestamp: &str, fix: &GpsFix) -> Result<(), TripError> {
        if self.jsonl.is_none() {
            self.jsonl = Some(self.open_rotating(JSONL_LOG_FILE)?);
        }
        let record = JsonlRecord {
            timestamp: timestamp.to_string(),
            data: fix.clone(),
        };
        let line = serde_json::to_string(&record)?;
        if let Some(file) = self.jsonl.as_mut() {
            file.write_line(&line)?;
        }
        Ok(())
    }

    fn write_csv(&mut self, timestamp: &str, fix: &GpsFix) -> Result<(), TripError> {
        if self.csv.is_none() {
            self.csv = Some(self.open_csv()?);
        }
        let Some(writer) = self.csv.as_mut() else {
            return Ok(());
        };
        writer.write_record([
            timestamp.to_string(),
            format_coord(fix.lat),
            format_coord(fix.lon),
            format_value(fix.height_msl),
            format_value(fix.ground_speed),
            format_value(fix.heading),
            fix.num_sv.to_string(),
            fix.fix_type_label().to_string(),
            format_value(fix.h_acc),
            format_value(fix.v_acc),
            format_value(fix.pdop),
            format_value(fix.hdop),
            format_value(fix.vdop),
            // High precision and RTK fields are not carried by NMEA
            "N/A".to_string(),
            "N/A".to_string(),
            "N/A".to_string(),
            fix.carrier_solution_label().to_string(),
            format_value(fix.diff_age),
            "N/A".to_string(),
            "N/A".to_string(),
        ])?;
        writer.flush()?;
        Ok(())
    }

    fn open_rotating(&self, name: &str) -> std::io::Result<RotatingFile> {
        RotatingFile::open(
            self.settings.log_dir.join(name),
            self.settings.max_log_bytes,
            self.settings.log_backup_count,
        )
    }

    fn open_csv(&self) -> Result<csv::Writer<File>, TripError> {
        fs::create_dir_all(&self.settings.log_dir)?;
        let path = self.settings.log_dir.join(CSV_LOG_FILE);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let is_new = file.metadata()?.len() == 0;
        let mut writer = csv::Writer::from_writer(file);
        if is_new {
            writer.write_record(GPS_CSV_HEADER)?;
            writer.flush()?;
        }
        debug!("Opened GPS CSV log {}", path.display());
        Ok(writer)
    }

    /// Delete files older than the configured age from the log and trip
    /// directories. Returns how many were removed.
    pub fn clean_old_logs(&self, now: SystemTime) -> usize {
        let max_age = Duration::from_secs(self.settings.max_log_age_days * 24 * 60 * 60);
        [&self.settings.log_dir, &self.settings.trip_log_dir]
            .into_iter()
            .map(|dir| remove_older_than(dir, now, max_age))
            .sum()
    }

    /// Free space on the log filesystem is below the configured minimum.
    pub fn is_low_on_space(&self) -> bool {
        let low = disk::is_low_on_space(&self.settings.log_dir, self.settings.min_disk_space_mb);
        if low {
            warn!(
                "Less than {} MB free for GPS logs in {}",
                self.settings.min_disk_space_mb,
                self.settings.log_dir.display()
            );
        }
        low
    }
}

fn remove_older_than(dir: &Path, now: SystemTime, max_age: Duration) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        let Ok(modified) = meta.modified() else {
            continue;
        };
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
        if age > max_age {
            match fs::remove_file(&path) {
                Ok(()) => {
                    info!("Removed old log file {}", path.display());
                    removed += 1;
                }
                Err(e) => warn!("Could not remove {}: {}", path.display(), e),
            }
        }
    }
    removed
}
