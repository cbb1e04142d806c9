//! Great-circle distance and unit conversions.

use serde::{Deserialize, Serialize};

/// Mean earth radius in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

const MPS_TO_KMH: f64 = 3.6;
const MPS_TO_MPH: f64 = 2.23694;
const M_TO_FT: f64 = 3.28084;
const M_PER_MILE: f64 = 1609.34;

/// Haversine distance between two points in metres.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// Signed heading change from `from` to `to` in degrees, within (-180, 180].
pub fn heading_delta(from: f64, to: f64) -> f64 {
    let mut diff = (to - from) % 360.0;
    if diff > 180.0 {
        diff -= 360.0;
    } else if diff <= -180.0 {
        diff += 360.0;
    }
    diff
}

/// Preferred display units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

impl Units {
    pub fn toggle(self) -> Self {
        match self {
            Units::Metric => Units::Imperial,
            Units::Imperial => Units::Metric,
        }
    }

    /// Live speed: km/h or mph.
    pub fn speed(&self, mps: f64) -> f64 {
        match self {
            Units::Metric => mps * MPS_TO_KMH,
            Units::Imperial => mps * MPS_TO_MPH,
        }
    }

    pub fn speed_unit(&self) -> &'static str {
        match self {
            Units::Metric => "km/h",
            Units::Imperial => "mph",
        }
    }

    /// Trip summary max speed: km/h or ft/s.
    pub fn trip_speed(&self, mps: f64) -> f64 {
        match self {
            Units::Metric => mps * MPS_TO_KMH,
            Units::Imperial => mps * M_TO_FT,
        }
    }

    pub fn trip_speed_unit(&self) -> &'static str {
        match self {
            Units::Metric => "km/h",
            Units::Imperial => "ft/s",
        }
    }

    pub fn altitude(&self, metres: f64) -> f64 {
        match self {
            Units::Metric => metres,
            Units::Imperial => metres * M_TO_FT,
        }
    }

    pub fn altitude_unit(&self) -> &'static str {
        match self {
            Units::Metric => "m MSL",
            Units::Imperial => "ft MSL",
        }
    }

    pub fn distance(&self, metres: f64) -> f64 {
        match self {
            Units::Metric => metres / 1000.0,
            Units::Imperial => metres / M_PER_MILE,
        }
    }

    pub fn distance_unit(&self) -> &'static str {
        match self {
            Units::Metric => "km",
            Units::Imperial => "miles",
        }
    }

    pub fn format_speed(&self, mps: f64) -> String {
        format_with_unit(self.speed(mps), self.speed_unit())
    }

    pub fn format_altitude(&self, metres: f64) -> String {
        format_with_unit(self.altitude(metres), self.altitude_unit())
    }

    pub fn format_distance(&self, metres: f64) -> String {
        format_with_unit(self.distance(metres), self.distance_unit())
    }
}

fn format_with_unit(value: f64, unit: &str) -> String {
    if value.is_finite() {
        format!("{:.2} {}", value, unit)
    } else {
        "N/A".to_string()
    }
}

/// Coordinate with six decimals, "N/A" when missing.
pub fn format_coord(value: f64) -> String {
    if value.is_finite() {
        format!("{:.6}", value)
    } else {
        "N/A".to_string()
    }
}

/// Value with two decimals, "N/A" when missing.
pub fn format_value(value: f64) -> String {
    if value.is_finite() {
        format!("{:.2}", value)
    } else {
        "N/A".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_reference_distances() {
        assert_eq!(haversine_distance(51.5, -0.12, 51.5, -0.12), 0.0);

        // One degree of latitude is ~111.19 km on a 6371 km sphere
        let d = haversine_distance(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111_194.9).abs() < 1.0, "got {}", d);

        // London to Paris, roughly 343.5 km
        let d = haversine_distance(51.5074, -0.1278, 48.8566, 2.3522);
        assert!((d - 343_500.0).abs() < 1_000.0, "got {}", d);
    }

    #[test]
    fn test_heading_delta_wraps() {
        assert_eq!(heading_delta(350.0, 10.0), 20.0);
        assert_eq!(heading_delta(10.0, 350.0), -20.0);
        assert_eq!(heading_delta(0.0, 180.0), 180.0);
        assert_eq!(heading_delta(90.0, 90.0), 0.0);
    }

    #[test]
    fn test_unit_conversions() {
        assert!((Units::Metric.speed(10.0) - 36.0).abs() < 1e-9);
        assert!((Units::Imperial.speed(10.0) - 22.3694).abs() < 1e-9);
        assert!((Units::Imperial.trip_speed(1.0) - 3.28084).abs() < 1e-9);
        assert!((Units::Imperial.distance(1609.34) - 1.0).abs() < 1e-9);
        assert_eq!(Units::Metric.format_distance(2500.0), "2.50 km");
        assert_eq!(Units::Metric.format_speed(f64::NAN), "N/A");
        assert_eq!(format_coord(12.3456789), "12.345679");
    }
}
