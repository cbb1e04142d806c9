//! Timestamped sensor readings.

use std::collections::BTreeMap;

use chrono::{DateTime, Local};
use serde::Serialize;

use super::catalog::SensorKind;

/// Metric key to value. `NaN` means "no reading".
pub type MetricValues = BTreeMap<String, f64>;

/// Sensor name to its metric values.
pub type SensorValues = BTreeMap<String, MetricValues>;

/// Every metric of `kind` set to NaN.
pub fn missing_values(kind: SensorKind) -> MetricValues {
    kind.metrics().iter().map(|m| (m.key.to_string(), f64::NAN)).collect()
}

/// One poll of every sensor.
#[derive(Debug, Clone, Serialize)]
pub struct Reading {
    pub timestamp: DateTime<Local>,
    pub values: SensorValues,
}

impl Reading {
    /// Build a reading, filling any absent sensor or metric with NaN so that
    /// every reading carries the full metric set.
    pub fn new(timestamp: DateTime<Local>, mut values: SensorValues) -> Self {
        for kind in SensorKind::ALL {
            let entry = values.entry(kind.name().to_string()).or_default();
            for metric in kind.metrics() {
                entry.entry(metric.key.to_string()).or_insert(f64::NAN);
            }
        }
        Self { timestamp, values }
    }

    /// Value of `metric` for `sensor`, NaN when absent.
    pub fn value(&self, sensor: SensorKind, metric: &str) -> f64 {
        self.values
            .get(sensor.name())
            .and_then(|m| m.get(metric))
            .copied()
            .unwrap_or(f64::NAN)
    }

    pub fn sensor(&self, sensor: SensorKind) -> Option<&MetricValues> {
        self.values.get(sensor.name())
    }
}
