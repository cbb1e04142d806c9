//! Persistent application settings.
//!
//! Settings are layered with the `config` crate: built-in defaults, then the
//! JSON settings file (if present), then `QWIIC__SECTION__KEY` environment
//! variables. Keys missing from the file keep their defaults.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::data::{SensorKind, TimeRange, DEFAULT_HISTORY_SIZE};
use crate::gps::{AnalysisThresholds, Geofence, TripSummary, Units};
use crate::logging::rotating::{DEFAULT_BACKUP_COUNT, DEFAULT_MAX_BYTES};

pub const DEFAULT_SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub sensors: SensorSettings,
    pub gps: GpsSettings,
    pub diagnostics: DiagnosticsSettings,
}

/// How accumulated sensor logs are archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveFormat {
    /// `sensor_logs_archive_<ts>.zip`, logs deleted afterwards.
    #[default]
    Zip,
    /// Logs moved into `archive_<ts>/`.
    Directory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorSettings {
    pub log_path: PathBuf,
    pub archive_path: PathBuf,
    pub archive_enabled: bool,
    pub archive_interval_hours: u64,
    pub archive_format: ArchiveFormat,
    pub mock_data_enabled: bool,
    /// Seed for mock data; random when unset.
    pub mock_seed: Option<u64>,
    pub plot_time_range: TimeRange,
    pub read_interval_secs: u64,
    pub max_plot_data_points: usize,
    /// Sensor name to whether its CSV log is written.
    pub log_sensor_settings: BTreeMap<String, bool>,
    pub i2c_bus: PathBuf,
    /// Logging is skipped while free space is below this.
    pub min_free_disk_mb: u64,
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("Sensor_Logs"),
            archive_path: PathBuf::from("Archive_Sensor_Logs"),
            archive_enabled: true,
            archive_interval_hours: 24,
            archive_format: ArchiveFormat::Zip,
            mock_data_enabled: false,
            mock_seed: None,
            plot_time_range: TimeRange::default(),
            read_interval_secs: 5,
            max_plot_data_points: DEFAULT_HISTORY_SIZE,
            log_sensor_settings: SensorKind::ALL
                .iter()
                .map(|k| (k.name().to_string(), true))
                .collect(),
            i2c_bus: PathBuf::from("/dev/i2c-1"),
            min_free_disk_mb: 10,
        }
    }
}

impl SensorSettings {
    pub fn logs_sensor(&self, kind: SensorKind) -> bool {
        self.log_sensor_settings.get(kind.name()).copied().unwrap_or(true)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpsSettings {
    pub port: String,
    pub baud_rate: u32,
    pub unit_preference: Units,
    pub log_dir: PathBuf,
    pub trip_log_dir: PathBuf,
    pub log_nmea: bool,
    pub log_json: bool,
    pub log_csv: bool,
    pub max_log_bytes: u64,
    pub log_backup_count: usize,
    pub max_log_age_days: u64,
    pub min_disk_space_mb: u64,
    pub max_nmea_lines: usize,
    pub max_trend_points: usize,
    pub thresholds: AnalysisThresholds,
    pub geofences: Vec<Geofence>,
    pub trip_history: Vec<TripSummary>,
    /// Replay this file instead of reading the receiver.
    pub playback_file: Option<PathBuf>,
}

impl Default for GpsSettings {
    fn default() -> Self {
        Self {
            port: "/dev/ttyACM0".to_string(),
            baud_rate: 115_200,
            unit_preference: Units::Metric,
            log_dir: PathBuf::from("logs"),
            trip_log_dir: PathBuf::from("logs").join("trips"),
            log_nmea: true,
            log_json: true,
            log_csv: true,
            max_log_bytes: DEFAULT_MAX_BYTES,
            log_backup_count: DEFAULT_BACKUP_COUNT,
            max_log_age_days: 30,
            min_disk_space_mb: 500,
            max_nmea_lines: 1000,
            max_trend_points: 500,
            thresholds: AnalysisThresholds::default(),
            geofences: Vec::new(),
            trip_history: Vec::new(),
            playback_file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsSettings {
    pub debug_log_path: PathBuf,
    /// DEBUG, INFO, WARNING, ERROR or CRITICAL.
    pub debug_log_level: String,
    /// Mirror diagnostics to stderr (headless mode only).
    pub debug_to_console_enabled: bool,
    pub max_bytes: u64,
    pub backup_count: usize,
}

impl Default for DiagnosticsSettings {
    fn default() -> Self {
        Self {
            debug_log_path: PathBuf::from("Debug_Logs").join("debug.log"),
            debug_log_level: "DEBUG".to_string(),
            debug_to_console_enabled: true,
            max_bytes: DEFAULT_MAX_BYTES,
            backup_count: DEFAULT_BACKUP_COUNT,
        }
    }
}

impl Settings {
    /// Layer defaults, the settings file and the environment.
    pub fn load(path: &Path) -> Result<Self> {
        let defaults = Config::try_from(&Settings::default())?;
        let config = Config::builder()
            .add_source(defaults)
            .add_source(File::from(path).format(FileFormat::Json).required(false))
            .add_source(
                Environment::with_prefix("QWIIC")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;

        config
            .try_deserialize()
            .with_context(|| format!("Invalid settings in {}", path.display()))
    }

    /// Like [`Settings::load`], but falls back to defaults on any error.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("{:#}; using default settings", e);
                Self::default()
            }
        }
    }

    /// Write the settings as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}
