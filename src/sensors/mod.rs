//! Sensor drivers and the suite that polls them.
//!
//! Drivers are written against the `embedded-hal` 1.0 I2C and delay traits,
//! so they run on Linux `/dev/i2c-*` (with the `hardware` feature) or on any
//! other bus implementation, including the fake bus used in tests.

pub mod bme280;
pub mod mock;
pub mod provider;
pub mod sgp40;
pub mod shtc3;
pub mod suite;
pub mod vcnl4040;

#[cfg(test)]
pub(crate) mod fake;

pub use provider::{I2cBusProvider, SensorProvider};
pub use suite::{Notice, SensorSuite};

use crate::data::{MetricValues, SensorKind};
use crate::error::SensorError;

/// A sensor that can be polled for its metrics.
pub trait Sensor: Send {
    fn kind(&self) -> SensorKind;

    /// Take one measurement. Either every metric is returned or an error.
    fn read(&mut self) -> Result<MetricValues, SensorError>;

    /// Ambient humidity (%RH) and temperature (°C) from another sensor.
    /// Only gas sensors use this.
    fn set_compensation(&mut self, _humidity: f64, _temperature: f64) {}
}

/// Sensirion CRC-8: polynomial 0x31, init 0xFF.
pub(crate) fn sensirion_crc8(data: &[u8]) -> u8 {
    let mut crc: u8 = 0xFF;
    for byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x31
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// Check a Sensirion `[msb, lsb, crc]` word and return it.
pub(crate) fn checked_word(bytes: &[u8]) -> Result<u16, SensorError> {
    match bytes {
        [msb, lsb, crc] if sensirion_crc8(&[*msb, *lsb]) == *crc => {
            Ok(u16::from_be_bytes([*msb, *lsb]))
        }
        _ => Err(SensorError::Crc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc_reference_value() {
        // Datasheet example
        assert_eq!(sensirion_crc8(&[0xBE, 0xEF]), 0x92);
        assert_eq!(sensirion_crc8(&[0x80, 0x00]), 0xA2);
        assert_eq!(sensirion_crc8(&[0x66, 0x66]), 0x93);
    }

    #[test]
    fn test_checked_word() {
        assert_eq!(checked_word(&[0xBE, 0xEF, 0x92]).unwrap(), 0xBEEF);
        assert!(matches!(checked_word(&[0xBE, 0xEF, 0x00]), Err(SensorError::Crc)));
    }
}
