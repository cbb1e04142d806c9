//! Post-trip analysis of recorded GPS tracks.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::geo::{haversine_distance, heading_delta, Units};
use super::{parse_timestamp, JsonlRecord, LogFormat};
use crate::data::duration::format_hms;
use crate::error::TripError;

/// Limits used to classify driving events.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisThresholds {
    /// Speeds at or below this are treated as standing still.
    pub speed_noise_threshold_mps: f64,
    /// Deceleration below this (negative) counts as hard braking.
    pub hard_braking_threshold_mps2: f64,
    /// Turn rate above this counts as sharp cornering.
    pub sharp_cornering_threshold_dps: f64,
}

impl Default for AnalysisThresholds {
    fn default() -> Self {
        Self {
            speed_noise_threshold_mps: 0.05,
            hard_braking_threshold_mps2: -3.0,
            sharp_cornering_threshold_dps: 20.0,
        }
    }
}

/// A complete track point.
#[derive(Debug, Clone, PartialEq)]
pub struct TripPoint {
    pub timestamp: DateTime<Local>,
    pub lat: f64,
    pub lon: f64,
    /// m/s
    pub speed: f64,
    /// degrees
    pub heading: f64,
}

impl TripPoint {
    fn is_complete(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite() && self.speed.is_finite() && self.heading.is_finite()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TripAnalysis {
    pub points: usize,
    pub total_distance_m: f64,
    pub duration_secs: f64,
    /// Mean of the speeds above the noise threshold.
    pub average_speed_mps: f64,
    pub max_speed_mps: f64,
    pub hard_braking_events: usize,
    pub sharp_cornering_events: usize,
}

impl TripAnalysis {
    /// Label / value pairs in the preferred units.
    pub fn describe(&self, units: Units) -> Vec<(&'static str, String)> {
        vec![
            ("Points", self.points.to_string()),
            ("Total Distance", units.format_distance(self.total_distance_m)),
            ("Duration", format_hms(self.duration_secs.round() as i64)),
            ("Average Speed", units.format_speed(self.average_speed_mps)),
            ("Max Speed", units.format_speed(self.max_speed_mps)),
            ("Hard Braking Events", self.hard_braking_events.to_string()),
            ("Sharp Cornering Events", self.sharp_cornering_events.to_string()),
        ]
    }
}

/// Load a CSV or JSONL track, dropping incomplete points and sorting by time.
pub fn load_trip_points(path: &Path) -> Result<Vec<TripPoint>, TripError> {
    let mut points = match LogFormat::from_path(path) {
        Some(LogFormat::Csv) => load_csv(path)?,
        Some(LogFormat::Jsonl) => load_jsonl(path)?,
        None => return Err(TripError::UnsupportedFormat(path.to_path_buf())),
    };

    points.retain(TripPoint::is_complete);
    points.sort_by_key(|p| p.timestamp);
    debug!("Loaded {} track points from {}", points.len(), path.display());
    Ok(points)
}

fn load_csv(path: &Path) -> Result<Vec<TripPoint>, TripError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h.trim() == name);

    let (Some(ts), Some(lat), Some(lon), Some(speed), Some(heading)) = (
        column("Timestamp"),
        column("Latitude"),
        column("Longitude"),
        column("Speed (m/s)"),
        column("Heading (deg)"),
    ) else {
        return Err(TripError::NoData(path.to_path_buf()));
    };

    let field = |record: &csv::StringRecord, idx: usize| -> f64 {
        record.get(idx).and_then(|s| s.trim().parse().ok()).unwrap_or(f64::NAN)
    };

    let points = reader
        .records()
        .filter_map(|record| record.ok())
        .filter_map(|record| {
            let timestamp = parse_timestamp(record.get(ts)?)?;
            Some(TripPoint {
                timestamp,
                lat: field(&record, lat),
                lon: field(&record, lon),
                speed: legacy_speed(field(&record, speed)),
                heading: field(&record, heading),
            })
        })
        .collect();
    Ok(points)
}

fn load_jsonl(path: &Path) -> Result<Vec<TripPoint>, TripError> {
    let reader = BufReader::new(File::open(path)?);
    let mut points = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let Ok(record) = serde_json::from_str::<JsonlRecord>(&line) else {
            continue;
        };
        let Some(timestamp) = parse_timestamp(&record.timestamp) else {
            continue;
        };
        points.push(TripPoint {
            timestamp,
            lat: record.data.lat,
            lon: record.data.lon,
            speed: legacy_speed(record.data.ground_speed),
            heading: record.data.heading,
        });
    }
    Ok(points)
}

fn legacy_speed(speed: f64) -> f64 {
    let mut fix = super::GpsFix {
        ground_speed: speed,
        ..Default::default()
    };
    fix.normalize_legacy_speed();
    fix.ground_speed
}

/// Distance, timing and driving-event statistics for a sorted track.
pub fn analyze(points: &[TripPoint], thresholds: &AnalysisThresholds) -> TripAnalysis {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return TripAnalysis::default();
    };

    let mut analysis = TripAnalysis {
        points: points.len(),
        duration_secs: (last.timestamp - first.timestamp).num_milliseconds() as f64 / 1000.0,
        max_speed_mps: points.iter().map(|p| p.speed).fold(0.0, f64::max),
        ..TripAnalysis::default()
    };

    let moving: Vec<f64> = points
        .iter()
        .map(|p| p.speed)
        .filter(|&s| s > thresholds.speed_noise_threshold_mps)
        .collect();
    if !moving.is_empty() {
        analysis.average_speed_mps = moving.iter().sum::<f64>() / moving.len() as f64;
    }

    for pair in points.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        analysis.total_distance_m += haversine_distance(a.lat, a.lon, b.lat, b.lon);

        let dt = (b.timestamp - a.timestamp).num_milliseconds() as f64 / 1000.0;
        if dt <= 0.0 {
            continue;
        }

        let accel = (b.speed - a.speed) / dt;
        if accel < thresholds.hard_braking_threshold_mps2 {
            analysis.hard_braking_events += 1;
        }

        if b.speed > thresholds.speed_noise_threshold_mps {
            let turn_rate = heading_delta(a.heading, b.heading).abs() / dt;
            if turn_rate > thresholds.sharp_cornering_threshold_dps {
                analysis.sharp_cornering_events += 1;
            }
        }
    }

    analysis
}

/// Load and analyze in one step.
pub fn analyze_file(path: &Path, thresholds: &AnalysisThresholds) -> Result<TripAnalysis, TripError> {
    let points = load_trip_points(path)?;
    Ok(analyze(&points, thresholds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn point(t0: DateTime<Local>, secs: i64, lat: f64, speed: f64, heading: f64) -> TripPoint {
        TripPoint {
            timestamp: t0 + TimeDelta::seconds(secs),
            lat,
            lon: 0.0,
            speed,
            heading,
        }
    }

    #[test]
    fn test_empty_track() {
        let analysis = analyze(&[], &AnalysisThresholds::default());
        assert_eq!(analysis, TripAnalysis::default());
    }

    #[test]
    fn test_distance_duration_and_speeds() {
        let t0 = Local::now();
        let points = vec![
            point(t0, 0, 0.0, 0.02, 0.0),
            point(t0, 10, 0.001, 10.0, 0.0),
            point(t0, 20, 0.002, 20.0, 0.0),
        ];
        let analysis = analyze(&points, &AnalysisThresholds::default());
        assert_eq!(analysis.points, 3);
        assert!((analysis.total_distance_m - 222.39).abs() < 0.1);
        assert_eq!(analysis.duration_secs, 20.0);
        assert_eq!(analysis.average_speed_mps, 15.0);
        assert_eq!(analysis.max_speed_mps, 20.0);
        assert_eq!(analysis.hard_braking_events, 0);
    }

    #[test]
    fn test_braking_and_cornering_events() {
        let t0 = Local::now();
        let points = vec![
            point(t0, 0, 0.0, 20.0, 350.0),
            // -10 m/s over 2 s = -5 m/s^2, heading +60 deg over 2 s = 30 deg/s
            point(t0, 2, 0.0001, 10.0, 50.0),
            // gentle: -1 m/s^2, 5 deg/s
            point(t0, 4, 0.0002, 8.0, 60.0),
            // stationary turn is ignored
            point(t0, 5, 0.0002, 0.02, 180.0),
        ];
        let analysis = analyze(&points, &AnalysisThresholds::default());
        assert_eq!(analysis.hard_braking_events, 2);
        assert_eq!(analysis.sharp_cornering_events, 1);
    }

    #[test]
    fn test_slow_crawl_counts_as_moving() {
        let t0 = Local::now();
        let points = vec![point(t0, 0, 0.0, 0.1, 0.0), point(t0, 10, 0.0, 0.3, 0.0)];
        let analysis = analyze(&points, &AnalysisThresholds::default());
        assert!((analysis.average_speed_mps - 0.2).abs() < 1e-9);

        let strict = AnalysisThresholds {
            speed_noise_threshold_mps: 0.5,
            ..AnalysisThresholds::default()
        };
        assert_eq!(analyze(&points, &strict).average_speed_mps, 0.0);
    }

    #[test]
    fn test_load_csv_drops_incomplete_and_sorts() {
        let mut file = NamedTempFile::with_suffix(".csv").unwrap();
        writeln!(file, "Timestamp,Latitude,Longitude,Altitude (MSL),Speed (m/s),Heading (deg)").unwrap();
        writeln!(file, "2024-05-01T10:00:02.000,1.0,2.0,5.0,3.0,90.0").unwrap();
        writeln!(file, "2024-05-01T10:00:01.000,1.0,2.0,5.0,2500.0,90.0").unwrap();
        writeln!(file, "2024-05-01T10:00:03.000,N/A,2.0,5.0,3.0,90.0").unwrap();
        writeln!(file, "not a time,1.0,2.0,5.0,3.0,90.0").unwrap();
        file.flush().unwrap();

        let points = load_trip_points(file.path()).unwrap();
        assert_eq!(points.len(), 2);
        assert!(points[0].timestamp < points[1].timestamp);
        // Legacy mm/s speed rescaled
        assert_eq!(points[0].speed, 2.5);
    }

    #[test]
    fn test_load_jsonl() {
        let mut file = NamedTempFile::with_suffix(".jsonl").unwrap();
        writeln!(
            file,
            r#"{{"timestamp":"2024-05-01T10:00:00.000","data":{{"lat":1.0,"lon":2.0,"gSpeed":4.0,"headMot":10.0}}}}"#
        )
        .unwrap();
        writeln!(file, "garbage").unwrap();
        writeln!(
            file,
            r#"{{"timestamp":"2024-05-01T10:00:01.000","data":{{"lat":1.0,"lon":2.0,"gSpeed":null,"headMot":10.0}}}}"#
        )
        .unwrap();
        file.flush().unwrap();

        let points = load_trip_points(file.path()).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].speed, 4.0);
    }

    #[test]
    fn test_unsupported_extension() {
        let file = NamedTempFile::with_suffix(".gpx").unwrap();
        assert!(matches!(
            load_trip_points(file.path()),
            Err(TripError::UnsupportedFormat(_))
        ));
    }
}
