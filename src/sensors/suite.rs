//! The set of sensors polled together.

use std::collections::BTreeMap;

use chrono::{DateTime, Local};
use tracing::debug;

use super::mock::MockGenerator;
use super::{Sensor, SensorProvider};
pub use crate::data::Notice;
use crate::data::{missing_values, Reading, SensorKind, SensorValues, StatusLevel};
use crate::error::SensorError;

/// Owns every sensor driver and produces complete [`Reading`]s.
///
/// Mock values are used when mock mode is on or when the I2C bus itself is
/// unavailable. A sensor that is simply not connected reads as NaN.
pub struct SensorSuite {
    provider: Option<Box<dyn SensorProvider>>,
    sensors: BTreeMap<SensorKind, Box<dyn Sensor>>,
    mock: MockGenerator,
    mock_mode: bool,
    bus_available: bool,
    /// Latest (humidity, temperature) for gas sensor compensation.
    ambient: Option<(f64, f64)>,
}

impl std::fmt::Debug for SensorSuite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorSuite")
            .field("connected", &self.connected())
            .field("mock_mode", &self.mock_mode)
            .field("bus_available", &self.bus_available)
            .finish()
    }
}

impl SensorSuite {
    /// Create a suite that opens drivers through `provider`.
    ///
    /// Nothing is opened until [`initialize`](Self::initialize).
    pub fn new(provider: Box<dyn SensorProvider>, mock_mode: bool, seed: Option<u64>) -> Self {
        Self {
            provider: Some(provider),
            sensors: BTreeMap::new(),
            mock: MockGenerator::new(seed),
            mock_mode,
            bus_available: true,
            ambient: None,
        }
    }

    /// Use already constructed drivers.
    pub fn with_sensors(sensors: Vec<Box<dyn Sensor>>, seed: Option<u64>) -> Self {
        Self {
            provider: None,
            sensors: sensors.into_iter().map(|s| (s.kind(), s)).collect(),
            mock: MockGenerator::new(seed),
            mock_mode: false,
            bus_available: true,
            ambient: None,
        }
    }

    pub fn is_mock(&self) -> bool {
        self.mock_mode || !self.bus_available
    }

    pub fn connected(&self) -> Vec<SensorKind> {
        self.sensors.keys().copied().collect()
    }

    /// (Re)open every sensor. Does nothing in mock mode.
    pub fn initialize(&mut self) -> Vec<Notice> {
        let mut notices = Vec::new();
        if self.mock_mode {
            self.sensors.clear();
            notices.push((StatusLevel::Info, "Mock data mode enabled".to_string()));
            return notices;
        }
        let Some(provider) = self.provider.as_mut() else {
            return notices;
        };

        self.sensors.clear();
        self.bus_available = true;
        for kind in SensorKind::ALL {
            match provider.open(kind) {
                Ok(sensor) => {
                    self.sensors.insert(kind, sensor);
                    notices.push((StatusLevel::Success, format!("{} connected.", kind.display_name())));
                }
                Err(SensorError::NotDetected(_)) => {
                    notices.push((StatusLevel::Danger, format!("{} not connected!", kind.display_name())));
                }
                Err(SensorError::Unsupported) => {
                    self.bus_available = false;
                    notices.push((
                        StatusLevel::Warning,
                        format!("I2C unavailable on {} (mocking).", provider.description()),
                    ));
                    break;
                }
                Err(e @ SensorError::Bus(_)) if self.sensors.is_empty() && kind == SensorKind::ALL[0] => {
                    // Could not even open the bus
                    self.bus_available = false;
                    notices.push((StatusLevel::Warning, format!("{} (mocking).", e)));
                    break;
                }
                Err(e) => {
                    notices.push((
                        StatusLevel::Danger,
                        format!("{} init error: {}", kind.display_name(), e),
                    ));
                }
            }
        }
        notices
    }

    /// Switch between mock and hardware readings.
    pub fn set_mock(&mut self, enable: bool) -> Vec<Notice> {
        self.mock_mode = enable;
        self.ambient = None;
        if enable {
            self.sensors.clear();
            vec![(StatusLevel::Info, "Mock data mode enabled".to_string())]
        } else {
            let mut notices = vec![(StatusLevel::Info, "Mock data mode disabled".to_string())];
            notices.extend(self.initialize());
            notices
        }
    }

    /// Read every sensor once.
    ///
    /// The reading always holds every metric of every sensor. A sensor whose
    /// read fails contributes only NaN and a warning.
    pub fn read_all(&mut self, now: DateTime<Local>) -> (Reading, Vec<Notice>) {
        let mut notices = Vec::new();
        let mut values = SensorValues::new();

        if self.is_mock() {
            for kind in SensorKind::ALL {
                values.insert(kind.name().to_string(), self.mock.values(kind));
            }
            return (Reading::new(now, values), notices);
        }

        for kind in SensorKind::ALL {
            let metrics = match self.sensors.get_mut(&kind) {
                Some(sensor) => {
                    if let Some((humidity, temperature)) = self.ambient {
                        sensor.set_compensation(humidity, temperature);
                    }
                    match sensor.read() {
                        Ok(metrics) => {
                            self.ambient = ambient_from(kind, &metrics).or(self.ambient);
                            metrics
                        }
                        Err(e) => {
                            debug!("{} read failed: {:?}", kind, e);
                            notices.push((
                                StatusLevel::Warning,
                                format!("{} read error: {}", kind.display_name(), e),
                            ));
                            missing_values(kind)
                        }
                    }
                }
                None => missing_values(kind),
            };
            values.insert(kind.name().to_string(), metrics);
        }
        (Reading::new(now, values), notices)
    }
}

fn ambient_from(kind: SensorKind, metrics: &crate::data::MetricValues) -> Option<(f64, f64)> {
    let (h, t) = match kind {
        SensorKind::Bme280 => (metrics.get("humidity")?, metrics.get("temp_c")?),
        SensorKind::Shtc3 => (metrics.get("humidity")?, metrics.get("temperature")?),
        _ => return None,
    };
    (h.is_finite() && t.is_finite()).then_some((*h, *t))
}
