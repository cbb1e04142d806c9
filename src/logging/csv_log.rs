//! Per-sensor daily CSV logs and their archiving.
//!
//! Layout: `<log_path>/<sensor>/<sensor>_<YYYY-MM-DD>.csv`. Archives go to
//! `<archive_path>/sensor_logs_archive_<YYYYmmdd_HHMMSS>.zip` or to an
//! `archive_<YYYYmmdd_HHMMSS>/` directory.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate, TimeDelta};
use tracing::{debug, error, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::disk;
use crate::data::{Notice, Reading, SensorKind, StatusLevel};
use crate::error::ArchiveError;
use crate::settings::{ArchiveFormat, SensorSettings};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";
const ARCHIVE_STAMP: &str = "%Y%m%d_%H%M%S";

struct OpenLog {
    path: PathBuf,
    date: NaiveDate,
    writer: csv::Writer<File>,
}

/// Writes sensor readings to CSV and archives the results.
///
/// Each log file has exactly one open handle, owned here. Handles are opened
/// lazily on the first write of the day and dropped on any write failure.
pub struct DataLogger {
    config: SensorSettings,
    handles: BTreeMap<SensorKind, OpenLog>,
    last_archive: DateTime<Local>,
    low_space: bool,
}

impl std::fmt::Debug for DataLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataLogger")
            .field("log_path", &self.config.log_path)
            .field("open", &self.handles.keys().collect::<Vec<_>>())
            .field("last_archive", &self.last_archive)
            .finish()
    }
}

impl DataLogger {
    pub fn new(config: &SensorSettings, now: DateTime<Local>) -> (Self, Vec<Notice>) {
        let mut logger = Self {
            config: config.clone(),
            handles: BTreeMap::new(),
            last_archive: now,
            low_space: false,
        };
        let notices = logger.create_dirs();
        info!(
            "Data logger writing to {} (archive {})",
            config.log_path.display(),
            config.archive_path.display()
        );
        (logger, notices)
    }

    pub fn config(&self) -> &SensorSettings {
        &self.config
    }

    pub fn last_archive(&self) -> DateTime<Local> {
        self.last_archive
    }

    /// Path of the log file `kind` writes to on `date`.
    pub fn log_file_path(&self, kind: SensorKind, date: NaiveDate) -> PathBuf {
        self.config
            .log_path
            .join(kind.name())
            .join(format!("{}_{}.csv", kind.name(), date.format("%Y-%m-%d")))
    }

    pub fn open_files(&self) -> Vec<PathBuf> {
        self.handles.values().map(|h| h.path.clone()).collect()
    }

    /// Append one row per enabled sensor.
    pub fn log_reading(&mut self, reading: &Reading) -> Vec<Notice> {
        let mut notices = Vec::new();

        if disk::is_low_on_space(&self.config.log_path, self.config.min_free_disk_mb) {
            if !self.low_space {
                self.low_space = true;
                notices.push((
                    StatusLevel::Warning,
                    format!(
                        "Low disk space (< {} MB), sensor logging paused",
                        self.config.min_free_disk_mb
                    ),
                ));
            }
            return notices;
        }
        if self.low_space {
            self.low_space = false;
            notices.push((StatusLevel::Info, "Disk space recovered, sensor logging resumed".to_string()));
        }

        let date = reading.timestamp.date_naive();
        let timestamp = reading.timestamp.format(TIMESTAMP_FORMAT).to_string();

        for kind in SensorKind::ALL {
            if !self.config.logs_sensor(kind) {
                continue;
            }
            if let Err(e) = self.ensure_open(kind, date) {
                error!("Error opening log file for {}: {}", kind, e);
                notices.push((
                    StatusLevel::Danger,
                    format!("Error opening/creating log file for {}: {}", kind, e),
                ));
                continue;
            }

            let mut row = vec![timestamp.clone()];
            row.extend(kind.metrics().iter().map(|metric| {
                let value = reading.value(kind, metric.key);
                if value.is_nan() {
                    "N/A".to_string()
                } else if metric.integer {
                    format!("{:.0}", value)
                } else {
                    value.to_string()
                }
            }));

            let written = match self.handles.get_mut(&kind) {
                Some(log) => log
                    .writer
                    .write_record(&row)
                    .map_err(io::Error::from)
                    .and_then(|_| log.writer.flush()),
                None => continue,
            };
            if let Err(e) = written {
                error!("Error writing data to CSV for {}: {}", kind, e);
                self.handles.remove(&kind);
                notices.push((
                    StatusLevel::Danger,
                    format!("Error writing data to CSV for {}: {}", kind, e),
                ));
            }
        }
        notices
    }

    fn ensure_open(&mut self, kind: SensorKind, date: NaiveDate) -> io::Result<()> {
        if let Some(log) = self.handles.get(&kind) {
            if log.date == date {
                return Ok(());
            }
            debug!("Closing {} after date change", log.path.display());
        }
        self.handles.remove(&kind);

        let path = self.log_file_path(kind, date);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let empty = file.metadata()?.len() == 0;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if empty {
            writer.write_record(kind.csv_header()).map_err(io::Error::from)?;
            writer.flush()?;
            info!("Created new CSV for {} at {}", kind, path.display());
        } else {
            info!("Appending to existing CSV for {} at {}", kind, path.display());
        }
        self.handles.insert(kind, OpenLog { path, date, writer });
        Ok(())
    }

    /// Archive every file under the log directory.
    ///
    /// All handles are closed first; the next reading reopens fresh files.
    /// Returns the archive path, or `None` when there was nothing to archive.
    pub fn archive_now(&mut self, now: DateTime<Local>) -> Result<Option<PathBuf>, ArchiveError> {
        self.close_all();

        let log_dir = self.config.log_path.clone();
        if !log_dir.is_dir() {
            return Err(ArchiveError::MissingLogDir(log_dir));
        }
        let mut files = Vec::new();
        collect_files(&log_dir, &mut files)?;
        files.sort();

        if files.is_empty() {
            self.last_archive = now;
            info!("Nothing to archive in {}", log_dir.display());
            return Ok(None);
        }

        fs::create_dir_all(&self.config.archive_path)?;
        let stamp = now.format(ARCHIVE_STAMP);
        let destination = match self.config.archive_format {
            ArchiveFormat::Zip => {
                let path = self
                    .config
                    .archive_path
                    .join(format!("sensor_logs_archive_{}.zip", stamp));
                write_zip(&path, &log_dir, &files)?;
                for file in &files {
                    fs::remove_file(file)?;
                }
                path
            }
            ArchiveFormat::Directory => {
                let dir = self.config.archive_path.join(format!("archive_{}", stamp));
                for file in &files {
                    let relative = file.strip_prefix(&log_dir).unwrap_or(file);
                    move_file(file, &dir.join(relative))?;
                }
                dir
            }
        };

        self.last_archive = now;
        info!("Archived {} log files to {}", files.len(), destination.display());
        Ok(Some(destination))
    }

    /// Archive when enabled and the interval has elapsed since the last one.
    pub fn check_and_archive_auto(
        &mut self,
        now: DateTime<Local>,
    ) -> Option<Result<Option<PathBuf>, ArchiveError>> {
        if !self.config.archive_enabled {
            return None;
        }
        // An interval too large for a TimeDelta never elapses
        let interval = i64::try_from(self.config.archive_interval_hours)
            .ok()
            .and_then(TimeDelta::try_hours)?;
        if now - self.last_archive > interval {
            info!(
                "Initiating automatic log archive after {} hours",
                self.config.archive_interval_hours
            );
            Some(self.archive_now(now))
        } else {
            None
        }
    }

    /// Apply new paths and toggles. Open files are closed first.
    pub fn update_config(&mut self, config: &SensorSettings) -> Vec<Notice> {
        self.close_all();
        self.config = config.clone();
        let mut notices = self.create_dirs();
        notices.push((
            StatusLevel::Info,
            format!("Log path updated to: {}", config.log_path.display()),
        ));
        notices.push((
            StatusLevel::Info,
            format!("Archive path updated to: {}", config.archive_path.display()),
        ));
        notices.push((
            StatusLevel::Info,
            format!(
                "Archiving {}.",
                if config.archive_enabled { "enabled" } else { "disabled" }
            ),
        ));
        notices.push((StatusLevel::Info, "Logging configuration updated.".to_string()));
        notices
    }

    pub fn close_all(&mut self) {
        for (kind, mut log) in std::mem::take(&mut self.handles) {
            if let Err(e) = log.writer.flush() {
                warn!("Error closing CSV file for {}: {}", kind, e);
            }
            debug!("Closed CSV file for {}", kind);
        }
    }

    fn create_dirs(&self) -> Vec<Notice> {
        let mut notices = Vec::new();
        for dir in [&self.config.log_path, &self.config.archive_path] {
            if let Err(e) = fs::create_dir_all(dir) {
                error!("Cannot create {}: {}", dir.display(), e);
                notices.push((
                    StatusLevel::Danger,
                    format!("Cannot create directory {}: {}", dir.display(), e),
                ));
            }
        }
        notices
    }
}

impl Drop for DataLogger {
    fn drop(&mut self) {
        self.close_all();
    }
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}

fn write_zip(path: &Path, root: &Path, files: &[PathBuf]) -> Result<(), ArchiveError> {
    let mut zip = ZipWriter::new(File::create(path)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for file in files {
        let name = file
            .strip_prefix(root)
            .unwrap_or(file)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        zip.start_file(name, options)?;
        io::copy(&mut File::open(file)?, &mut zip)?;
    }
    zip.finish()?;
    Ok(())
}

/// Rename, falling back to copy and delete across filesystems.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    if fs::rename(from, to).is_err() {
        fs::copy(from, to)?;
        fs::remove_file(from)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    use crate::data::SensorValues;

    fn settings(dir: &TempDir) -> SensorSettings {
        SensorSettings {
            log_path: dir.path().join("logs"),
            archive_path: dir.path().join("archive"),
            min_free_disk_mb: 0,
            ..SensorSettings::default()
        }
    }

    fn at(day: u32, hour: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    fn reading(now: DateTime<Local>) -> Reading {
        let mut values = SensorValues::new();
        let mut bme = crate::data::MetricValues::new();
        bme.insert("temp_c".to_string(), 21.5);
        values.insert("bme280".to_string(), bme);
        let mut prox = crate::data::MetricValues::new();
        prox.insert("proximity".to_string(), 12.0);
        values.insert("proximity".to_string(), prox);
        Reading::new(now, values)
    }

    fn read_lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_header_once_and_na_values() {
        let dir = TempDir::new().unwrap();
        let (mut logger, notices) = DataLogger::new(&settings(&dir), at(1, 8));
        assert!(notices.is_empty());

        assert!(logger.log_reading(&reading(at(1, 9))).is_empty());
        assert!(logger.log_reading(&reading(at(1, 10))).is_empty());
        logger.close_all();

        let path = logger.log_file_path(SensorKind::Bme280, at(1, 9).date_naive());
        assert!(path.ends_with("bme280/bme280_2024-03-01.csv"));
        let lines = read_lines(&path);
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "timestamp,temperature_c,humidity,pressure_hpa,altitude_m,temperature_f,dewpoint_c,dewpoint_f"
        );
        assert!(lines[1].starts_with("2024-03-01T09:00:00.000000,21.5,N/A,N/A"));

        let prox = read_lines(&logger.log_file_path(SensorKind::Proximity, at(1, 9).date_naive()));
        assert!(prox[1].ends_with(",12,N/A,N/A"));

        // Reopening appends without a second header
        let (mut again, _) = DataLogger::new(&settings(&dir), at(1, 11));
        again.log_reading(&reading(at(1, 11)));
        again.close_all();
        assert_eq!(read_lines(&path).len(), 4);
    }

    #[test]
    fn test_date_change_opens_new_file() {
        let dir = TempDir::new().unwrap();
        let (mut logger, _) = DataLogger::new(&settings(&dir), at(1, 8));
        logger.log_reading(&reading(at(1, 23)));
        logger.log_reading(&reading(at(2, 0)));

        let open = logger.open_files();
        assert!(open.iter().all(|p| p.to_string_lossy().contains("2024-03-02")));
        assert!(logger.log_file_path(SensorKind::Sgp40, at(1, 0).date_naive()).exists());
        assert!(logger.log_file_path(SensorKind::Sgp40, at(2, 0).date_naive()).exists());
    }

    #[test]
    fn test_disabled_sensor_not_logged() {
        let dir = TempDir::new().unwrap();
        let mut config = settings(&dir);
        config.log_sensor_settings.insert("sgp40".to_string(), false);
        let (mut logger, _) = DataLogger::new(&config, at(1, 8));
        logger.log_reading(&reading(at(1, 9)));
        assert!(!logger.log_file_path(SensorKind::Sgp40, at(1, 9).date_naive()).exists());
        assert_eq!(logger.open_files().len(), 3);
    }

    #[test]
    fn test_zip_archive_empties_log_dir() {
        let dir = TempDir::new().unwrap();
        let config = settings(&dir);
        let (mut logger, _) = DataLogger::new(&config, at(1, 8));
        logger.log_reading(&reading(at(1, 9)));

        let archive = logger.archive_now(at(1, 12)).unwrap().unwrap();
        assert_eq!(
            archive.file_name().unwrap(),
            "sensor_logs_archive_20240301_120000.zip"
        );
        assert!(logger.open_files().is_empty());

        let mut remaining = Vec::new();
        collect_files(&config.log_path, &mut remaining).unwrap();
        assert!(remaining.is_empty());

        let zip = zip::ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        assert_eq!(zip.len(), 4);
        assert!(zip.file_names().any(|n| n == "bme280/bme280_2024-03-01.csv"));

        // Logging continues into a fresh file
        assert!(logger.log_reading(&reading(at(1, 13))).is_empty());
        let path = logger.log_file_path(SensorKind::Bme280, at(1, 13).date_naive());
        assert_eq!(read_lines(&path).len(), 2);
    }

    #[test]
    fn test_directory_archive_moves_files() {
        let dir = TempDir::new().unwrap();
        let mut config = settings(&dir);
        config.archive_format = ArchiveFormat::Directory;
        let (mut logger, _) = DataLogger::new(&config, at(1, 8));
        logger.log_reading(&reading(at(1, 9)));

        let archive = logger.archive_now(at(1, 12)).unwrap().unwrap();
        assert!(archive.ends_with("archive_20240301_120000"));
        assert!(archive.join("shtc3").join("shtc3_2024-03-01.csv").exists());
        assert!(!logger.log_file_path(SensorKind::Shtc3, at(1, 9).date_naive()).exists());
    }

    #[test]
    fn test_archive_with_nothing_to_do() {
        let dir = TempDir::new().unwrap();
        let (mut logger, _) = DataLogger::new(&settings(&dir), at(1, 8));
        assert!(logger.archive_now(at(1, 9)).unwrap().is_none());
        assert_eq!(logger.last_archive(), at(1, 9));
    }

    #[test]
    fn test_auto_archive_interval() {
        let dir = TempDir::new().unwrap();
        let (mut logger, _) = DataLogger::new(&settings(&dir), at(1, 0));
        logger.log_reading(&reading(at(1, 1)));

        assert!(logger.check_and_archive_auto(at(1, 23)).is_none());
        let result = logger.check_and_archive_auto(at(2, 1)).unwrap();
        assert!(result.unwrap().is_some());
        assert_eq!(logger.last_archive(), at(2, 1));
        assert!(logger.check_and_archive_auto(at(2, 2)).is_none());

        let mut disabled = settings(&dir);
        disabled.archive_enabled = false;
        logger.update_config(&disabled);
        assert!(logger.check_and_archive_auto(at(9, 0)).is_none());
    }

    #[test]
    fn test_auto_archive_huge_interval_never_fires() {
        let dir = TempDir::new().unwrap();
        for hours in [u64::MAX, 1 << 60, i64::MAX as u64] {
            let mut config = settings(&dir);
            config.archive_interval_hours = hours;
            let (mut logger, _) = DataLogger::new(&config, at(1, 0));
            logger.log_reading(&reading(at(1, 1)));
            assert!(logger.check_and_archive_auto(at(31, 0)).is_none());
            assert_eq!(logger.last_archive(), at(1, 0));
        }
    }

    #[test]
    fn test_write_failure_drops_handle_and_reopens() {
        let dir = TempDir::new().unwrap();
        let (mut logger, _) = DataLogger::new(&settings(&dir), at(1, 0));
        assert!(logger.log_reading(&reading(at(1, 1))).is_empty());

        // Swap in a handle that cannot be written to
        let path = logger.log_file_path(SensorKind::Bme280, at(1, 1).date_naive());
        let read_only = File::open(&path).unwrap();
        logger.handles.get_mut(&SensorKind::Bme280).unwrap().writer =
            csv::WriterBuilder::new().has_headers(false).from_writer(read_only);

        let notices = logger.log_reading(&reading(at(1, 2)));
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].0, StatusLevel::Danger);
        assert!(notices[0].1.starts_with("Error writing data to CSV for bme280"));
        assert!(!logger.handles.contains_key(&SensorKind::Bme280));
        assert_eq!(logger.open_files().len(), 3);

        // Next reading reopens the same file and appends
        assert!(logger.log_reading(&reading(at(1, 3))).is_empty());
        assert_eq!(logger.open_files().len(), 4);
        logger.close_all();
        let lines = read_lines(&path);
        assert_eq!(lines.len(), 3);
        assert!(lines[2].starts_with("2024-03-01T03:00:00.000000,"));
    }

    #[test]
    fn test_update_config_switches_paths() {
        let dir = TempDir::new().unwrap();
        let (mut logger, _) = DataLogger::new(&settings(&dir), at(1, 0));
        logger.log_reading(&reading(at(1, 1)));

        let mut moved = settings(&dir);
        moved.log_path = dir.path().join("elsewhere");
        let notices = logger.update_config(&moved);
        assert!(logger.open_files().is_empty());
        assert_eq!(notices.last().unwrap().1, "Logging configuration updated.");

        logger.log_reading(&reading(at(1, 2)));
        assert!(dir.path().join("elsewhere").join("bme280").is_dir());
    }

    #[test]
    fn test_low_disk_space_skips_logging() {
        let dir = TempDir::new().unwrap();
        let mut config = settings(&dir);
        config.min_free_disk_mb = u64::MAX;
        let (mut logger, _) = DataLogger::new(&config, at(1, 0));
        let notices = logger.log_reading(&reading(at(1, 1)));

        if disk::free_space_mb(&config.log_path).is_some() {
            assert_eq!(notices.len(), 1);
            assert_eq!(notices[0].0, StatusLevel::Warning);
            assert!(logger.open_files().is_empty());
            // Warned once
            assert!(logger.log_reading(&reading(at(1, 2))).is_empty());
        }
    }
}
