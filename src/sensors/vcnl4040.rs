//! Vishay VCNL4040 proximity and ambient light sensor (Qwiic Proximity).
//!
//! Registers are 16 bits wide, addressed by a command code and sent low byte
//! first.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use super::Sensor;
use crate::data::{MetricValues, SensorKind};
use crate::error::SensorError;

pub const DEFAULT_ADDRESS: u8 = 0x60;
const DEVICE_ID: u16 = 0x0186;

const ALS_CONF: u8 = 0x00;
const PS_CONF1_2: u8 = 0x03;
const PS_CONF3_MS: u8 = 0x04;
const PS_DATA: u8 = 0x08;
const ALS_DATA: u8 = 0x09;
const WHITE_DATA: u8 = 0x0A;
const ID: u8 = 0x0C;

/// ALS_SD / PS_SD: shutdown when set.
const SHUTDOWN_BIT: u16 = 0x0001;
/// WHITE_EN in PS_MS (high byte of 0x04): white channel disabled when set.
const WHITE_DISABLE_BIT: u16 = 0x8000;

pub struct Vcnl4040<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
}

impl<I2C: I2c, D: DelayNs> Vcnl4040<I2C, D> {
    /// Check the ID and power on proximity, ambient and white channels.
    pub fn new(i2c: I2C, delay: D, address: u8) -> Result<Self, SensorError> {
        let mut sensor = Self { i2c, delay, address };

        let id = sensor.read_command(ID).map_err(|_| SensorError::NotDetected(address))?;
        if id != DEVICE_ID {
            return Err(SensorError::ChipId {
                expected: DEVICE_ID,
                found: id,
            });
        }

        sensor.update(ALS_CONF, |v| v & !SHUTDOWN_BIT)?;
        sensor.update(PS_CONF1_2, |v| v & !SHUTDOWN_BIT)?;
        sensor.update(PS_CONF3_MS, |v| v & !WHITE_DISABLE_BIT)?;
        // First ALS integration (80 ms default)
        sensor.delay.delay_ms(80);
        Ok(sensor)
    }

    pub fn proximity(&mut self) -> Result<u16, SensorError> {
        self.read_command(PS_DATA)
    }

    pub fn ambient(&mut self) -> Result<u16, SensorError> {
        self.read_command(ALS_DATA)
    }

    pub fn white(&mut self) -> Result<u16, SensorError> {
        self.read_command(WHITE_DATA)
    }

    fn read_command(&mut self, command: u8) -> Result<u16, SensorError> {
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(self.address, &[command], &mut buf)
            .map_err(SensorError::bus)?;
        Ok(u16::from_le_bytes(buf))
    }

    fn write_command(&mut self, command: u8, value: u16) -> Result<(), SensorError> {
        let [lsb, msb] = value.to_le_bytes();
        self.i2c
            .write(self.address, &[command, lsb, msb])
            .map_err(SensorError::bus)
    }

    fn update(&mut self, command: u8, f: impl FnOnce(u16) -> u16) -> Result<(), SensorError> {
        let value = self.read_command(command)?;
        self.write_command(command, f(value))
    }
}

impl<I2C: I2c + Send, D: DelayNs + Send> Sensor for Vcnl4040<I2C, D> {
    fn kind(&self) -> SensorKind {
        SensorKind::Proximity
    }

    fn read(&mut self) -> Result<MetricValues, SensorError> {
        let proximity = self.proximity()?;
        let ambient = self.ambient()?;
        let white = self.white()?;

        let mut values = MetricValues::new();
        values.insert("proximity".to_string(), proximity as f64);
        values.insert("ambient_light".to_string(), ambient as f64);
        values.insert("white_light".to_string(), white as f64);
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::fake::{FakeBus, NoDelay};

    fn bus_with_vcnl4040() -> FakeBus {
        let bus = FakeBus::with_device(DEFAULT_ADDRESS);
        bus.set_word(DEFAULT_ADDRESS, ID, DEVICE_ID);
        // Power-on defaults: everything shut down
        bus.set_word(DEFAULT_ADDRESS, ALS_CONF, 0x0001);
        bus.set_word(DEFAULT_ADDRESS, PS_CONF1_2, 0x0001);
        bus.set_word(DEFAULT_ADDRESS, PS_CONF3_MS, 0x8000);
        bus
    }

    #[test]
    fn test_power_on() {
        let bus = bus_with_vcnl4040();
        Vcnl4040::new(bus.clone(), NoDelay, DEFAULT_ADDRESS).unwrap();
        assert_eq!(bus.word(DEFAULT_ADDRESS, ALS_CONF), Some(0x0000));
        assert_eq!(bus.word(DEFAULT_ADDRESS, PS_CONF1_2), Some(0x0000));
        assert_eq!(bus.word(DEFAULT_ADDRESS, PS_CONF3_MS), Some(0x0000));
    }

    #[test]
    fn test_read_counts() {
        let bus = bus_with_vcnl4040();
        bus.set_word(DEFAULT_ADDRESS, PS_DATA, 42);
        bus.set_word(DEFAULT_ADDRESS, ALS_DATA, 0x0203);
        bus.set_word(DEFAULT_ADDRESS, WHITE_DATA, 700);

        let mut sensor = Vcnl4040::new(bus, NoDelay, DEFAULT_ADDRESS).unwrap();
        let values = sensor.read().unwrap();
        assert_eq!(values["proximity"], 42.0);
        assert_eq!(values["ambient_light"], 515.0);
        assert_eq!(values["white_light"], 700.0);
    }

    #[test]
    fn test_wrong_id() {
        let bus = bus_with_vcnl4040();
        bus.set_word(DEFAULT_ADDRESS, ID, 0x1234);
        assert!(matches!(
            Vcnl4040::new(bus, NoDelay, DEFAULT_ADDRESS),
            Err(SensorError::ChipId { found: 0x1234, .. })
        ));
    }

    #[test]
    fn test_read_failure() {
        let bus = bus_with_vcnl4040();
        let mut sensor = Vcnl4040::new(bus.clone(), NoDelay, DEFAULT_ADDRESS).unwrap();
        bus.set_fail_reads(true);
        assert!(matches!(sensor.read(), Err(SensorError::Bus(_))));
    }
}
