//! Static description of every supported sensor and the metrics it reports.

use serde::{Deserialize, Serialize};

use super::status::HealthStatus;

/// The sensor families the monitor knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    /// Bosch BME280 temperature / humidity / pressure.
    Bme280,
    /// Sensirion SGP40 VOC index.
    Sgp40,
    /// Sensirion SHTC3 temperature / humidity.
    Shtc3,
    /// Vishay VCNL4040 proximity and ambient light.
    Proximity,
}

impl SensorKind {
    pub const ALL: [SensorKind; 4] = [
        SensorKind::Bme280,
        SensorKind::Sgp40,
        SensorKind::Shtc3,
        SensorKind::Proximity,
    ];

    /// Key used in readings, log directories and settings.
    pub fn name(&self) -> &'static str {
        match self {
            SensorKind::Bme280 => "bme280",
            SensorKind::Sgp40 => "sgp40",
            SensorKind::Shtc3 => "shtc3",
            SensorKind::Proximity => "proximity",
        }
    }

    /// Human readable name for the dashboard.
    pub fn display_name(&self) -> &'static str {
        match self {
            SensorKind::Bme280 => "BME280",
            SensorKind::Sgp40 => "SGP40",
            SensorKind::Shtc3 => "SHTC3",
            SensorKind::Proximity => "VCNL4040",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name().eq_ignore_ascii_case(name))
    }

    /// Metrics reported by this sensor, in log column order.
    pub fn metrics(&self) -> &'static [MetricInfo] {
        match self {
            SensorKind::Bme280 => BME280_METRICS,
            SensorKind::Sgp40 => SGP40_METRICS,
            SensorKind::Shtc3 => SHTC3_METRICS,
            SensorKind::Proximity => PROXIMITY_METRICS,
        }
    }

    pub fn metric(&self, key: &str) -> Option<&'static MetricInfo> {
        self.metrics().iter().find(|m| m.key == key)
    }

    /// CSV header row for this sensor's daily log file.
    pub fn csv_header(&self) -> Vec<&'static str> {
        std::iter::once("timestamp").chain(self.metrics().iter().map(|m| m.column)).collect()
    }
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Display and simulation metadata for a single metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricInfo {
    /// Key inside a reading.
    pub key: &'static str,
    /// Column name in the CSV log.
    pub column: &'static str,
    pub label: &'static str,
    pub unit: &'static str,
    /// Lower bound of the dashboard gauge.
    pub gauge_min: f64,
    /// Upper bound of the dashboard gauge.
    pub gauge_max: f64,
    /// Mock values are drawn uniformly from `[mock_min, mock_max]`.
    pub mock_min: f64,
    pub mock_max: f64,
    /// Raw counts rather than a physical quantity.
    pub integer: bool,
}

impl MetricInfo {
    const fn new(
        key: &'static str,
        column: &'static str,
        label: &'static str,
        unit: &'static str,
        gauge: (f64, f64),
        mock: (f64, f64),
    ) -> Self {
        Self {
            key,
            column,
            label,
            unit,
            gauge_min: gauge.0,
            gauge_max: gauge.1,
            mock_min: mock.0,
            mock_max: mock.1,
            integer: false,
        }
    }

    const fn counts(mut self) -> Self {
        self.integer = true;
        self
    }

    /// Position of `value` inside the gauge range, clamped to `0.0..=1.0`.
    pub fn gauge_ratio(&self, value: f64) -> f64 {
        if !value.is_finite() {
            return 0.0;
        }
        let span = self.gauge_max - self.gauge_min;
        if span <= 0.0 {
            return 0.0;
        }
        ((value - self.gauge_min) / span).clamp(0.0, 1.0)
    }

    /// NaN is critical (no reading); outside the gauge range is a warning.
    pub fn health(&self, value: f64) -> HealthStatus {
        if value.is_nan() {
            HealthStatus::Critical
        } else if value < self.gauge_min || value > self.gauge_max {
            HealthStatus::Warning
        } else {
            HealthStatus::Healthy
        }
    }

    /// Format a value for display, "N/A" when missing.
    pub fn format(&self, value: f64) -> String {
        if value.is_nan() {
            "N/A".to_string()
        } else if self.integer {
            format!("{:.0}", value)
        } else {
            format!("{:.2}", value)
        }
    }
}

const BME280_METRICS: &[MetricInfo] = &[
    MetricInfo::new("temp_c", "temperature_c", "Temperature", "°C", (0.0, 50.0), (20.0, 30.0)),
    MetricInfo::new("humidity", "humidity", "Humidity", "%RH", (0.0, 100.0), (40.0, 60.0)),
    MetricInfo::new("pressure", "pressure_hpa", "Pressure", "hPa", (900.0, 1100.0), (900.0, 1100.0)),
    MetricInfo::new("altitude", "altitude_m", "Altitude", "m", (-100.0, 1000.0), (500.0, 1500.0)),
    MetricInfo::new("temp_f", "temperature_f", "Temperature", "°F", (32.0, 122.0), (68.0, 86.0)),
    MetricInfo::new("dewpoint_c", "dewpoint_c", "Dew Point", "°C", (-10.0, 30.0), (10.0, 20.0)),
    MetricInfo::new("dewpoint_f", "dewpoint_f", "Dew Point", "°F", (14.0, 86.0), (50.0, 68.0)),
];

const SGP40_METRICS: &[MetricInfo] = &[MetricInfo::new(
    "voc_index",
    "voc_index",
    "VOC Index",
    "",
    (0.0, 500.0),
    (0.0, 500.0),
)];

const SHTC3_METRICS: &[MetricInfo] = &[
    MetricInfo::new("temperature", "temperature_c", "Temperature", "°C", (0.0, 50.0), (20.0, 30.0)),
    MetricInfo::new("humidity", "humidity", "Humidity", "%RH", (0.0, 100.0), (40.0, 60.0)),
];

const PROXIMITY_METRICS: &[MetricInfo] = &[
    MetricInfo::new("proximity", "proximity", "Proximity", "", (0.0, 255.0), (0.0, 255.0)).counts(),
    MetricInfo::new("ambient_light", "ambient_light", "Ambient Light", "lux", (0.0, 1000.0), (0.0, 1023.0))
        .counts(),
    MetricInfo::new("white_light", "white_light", "White Light", "lux", (0.0, 1000.0), (0.0, 1023.0))
        .counts(),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_headers() {
        assert_eq!(
            SensorKind::Bme280.csv_header(),
            vec![
                "timestamp",
                "temperature_c",
                "humidity",
                "pressure_hpa",
                "altitude_m",
                "temperature_f",
                "dewpoint_c",
                "dewpoint_f"
            ]
        );
        assert_eq!(SensorKind::Sgp40.csv_header(), vec!["timestamp", "voc_index"]);
        assert_eq!(
            SensorKind::Proximity.csv_header(),
            vec!["timestamp", "proximity", "ambient_light", "white_light"]
        );
    }

    #[test]
    fn test_from_name() {
        assert_eq!(SensorKind::from_name("SHTC3"), Some(SensorKind::Shtc3));
        assert_eq!(SensorKind::from_name("bmp180"), None);
    }

    #[test]
    fn test_metric_health_and_format() {
        let temp = SensorKind::Bme280.metric("temp_c").unwrap();
        assert_eq!(temp.health(25.0), HealthStatus::Healthy);
        assert_eq!(temp.health(60.0), HealthStatus::Warning);
        assert_eq!(temp.health(f64::NAN), HealthStatus::Critical);
        assert_eq!(temp.format(f64::NAN), "N/A");
        assert_eq!(temp.format(21.456), "21.46");

        let prox = SensorKind::Proximity.metric("proximity").unwrap();
        assert_eq!(prox.format(12.0), "12");
        assert!((prox.gauge_ratio(510.0) - 1.0).abs() < f64::EPSILON);
    }
}
