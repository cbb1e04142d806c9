//! Where sensor drivers come from.

use crate::data::SensorKind;
use crate::error::SensorError;

use super::Sensor;

/// Opens a driver for a sensor kind.
pub trait SensorProvider: Send {
    fn open(&mut self, kind: SensorKind) -> Result<Box<dyn Sensor>, SensorError>;

    /// Shown in status messages, e.g. "/dev/i2c-1".
    fn description(&self) -> String;
}

/// Linux I2C character device (`/dev/i2c-N`).
///
/// Each driver gets its own handle on the bus. Without the `hardware`
/// feature every open fails with [`SensorError::Unsupported`].
#[derive(Debug, Clone)]
pub struct I2cBusProvider {
    bus: String,
}

impl I2cBusProvider {
    pub fn new(bus: impl Into<String>) -> Self {
        Self { bus: bus.into() }
    }
}

impl SensorProvider for I2cBusProvider {
    #[cfg(feature = "hardware")]
    fn open(&mut self, kind: SensorKind) -> Result<Box<dyn Sensor>, SensorError> {
        use linux_embedded_hal::{Delay, I2cdev};

        use super::{bme280::Bme280, sgp40::Sgp40, shtc3::Shtc3, vcnl4040::Vcnl4040};

        let i2c = I2cdev::new(&self.bus)
            .map_err(|e| SensorError::Bus(format!("Failed to open {}: {}", self.bus, e)))?;
        Ok(match kind {
            SensorKind::Bme280 => Box::new(Bme280::new(i2c, Delay, super::bme280::DEFAULT_ADDRESS)?),
            SensorKind::Sgp40 => Box::new(Sgp40::new(i2c, Delay, super::sgp40::DEFAULT_ADDRESS)?),
            SensorKind::Shtc3 => Box::new(Shtc3::new(i2c, Delay, super::shtc3::DEFAULT_ADDRESS)?),
            SensorKind::Proximity => {
                Box::new(Vcnl4040::new(i2c, Delay, super::vcnl4040::DEFAULT_ADDRESS)?)
            }
        })
    }

    #[cfg(not(feature = "hardware"))]
    fn open(&mut self, _kind: SensorKind) -> Result<Box<dyn Sensor>, SensorError> {
        Err(SensorError::Unsupported)
    }

    fn description(&self) -> String {
        self.bus.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "hardware"))]
    #[test]
    fn test_unsupported_without_feature() {
        let mut provider = I2cBusProvider::new("/dev/i2c-1");
        assert!(matches!(provider.open(SensorKind::Bme280), Err(SensorError::Unsupported)));
        assert_eq!(provider.description(), "/dev/i2c-1");
    }
}
