//! GPS receiver support: NMEA parsing, live and replayed fixes, trips,
//! geofences and the GPS data logs.

pub mod analysis;
pub mod fix;
pub mod geo;
pub mod geofence;
pub mod logger;
pub mod nmea;
pub mod playback;
pub mod reader;
pub mod session;
pub mod trip;

use std::path::Path;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};

pub use analysis::{analyze, analyze_file, load_trip_points, AnalysisThresholds, TripAnalysis, TripPoint};
pub use fix::{GpsFix, SatelliteInfo};
pub use geo::{haversine_distance, Units};
pub use geofence::{Geofence, GeofenceEvent, GeofenceMonitor};
pub use logger::GpsLogger;
pub use nmea::NmeaAccumulator;
pub use playback::{PlaybackManager, PlaybackState};
pub use reader::GpsReader;
pub use session::GpsSession;
pub use trip::{TripRecorder, TripSummary};

/// One line of a JSONL GPS log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonlRecord {
    pub timestamp: String,
    pub data: GpsFix,
}

/// Recorded track formats understood by analysis and playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Csv,
    Jsonl,
}

impl LogFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(LogFormat::Csv),
            "jsonl" | "json" => Some(LogFormat::Jsonl),
            _ => None,
        }
    }
}

/// Local timestamp as written to GPS logs.
pub fn format_timestamp(at: DateTime<Local>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}

/// Accepts RFC 3339 or naive local `YYYY-MM-DD[T ]HH:MM:SS[.fff]`.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Local>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Local));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
}
