//! Sensirion SHTC3 temperature and humidity sensor.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use super::{checked_word, Sensor};
use crate::data::{MetricValues, SensorKind};
use crate::error::SensorError;

pub const DEFAULT_ADDRESS: u8 = 0x70;

const CMD_WAKEUP: u16 = 0x3517;
const CMD_SLEEP: u16 = 0xB098;
const CMD_READ_ID: u16 = 0xEFC8;
/// Normal mode, temperature first, no clock stretching.
const CMD_MEASURE: u16 = 0x7866;

const ID_MASK: u16 = 0x083F;
const ID_VALUE: u16 = 0x0807;

/// Max normal-mode measurement time.
const MEASURE_MS: u32 = 13;
const WAKEUP_US: u32 = 240;

pub fn convert_temperature(raw: u16) -> f64 {
    -45.0 + 175.0 * raw as f64 / 65536.0
}

pub fn convert_humidity(raw: u16) -> f64 {
    100.0 * raw as f64 / 65536.0
}

pub struct Shtc3<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
}

impl<I2C: I2c, D: DelayNs> Shtc3<I2C, D> {
    /// Wake the sensor and check its ID register.
    pub fn new(i2c: I2C, delay: D, address: u8) -> Result<Self, SensorError> {
        let mut sensor = Self { i2c, delay, address };
        sensor.wake().map_err(|_| SensorError::NotDetected(address))?;

        sensor.command(CMD_READ_ID)?;
        let mut buf = [0u8; 3];
        sensor.i2c.read(address, &mut buf).map_err(SensorError::bus)?;
        let id = checked_word(&buf)?;
        if id & ID_MASK != ID_VALUE {
            return Err(SensorError::ChipId {
                expected: ID_VALUE,
                found: id & ID_MASK,
            });
        }

        sensor.command(CMD_SLEEP)?;
        Ok(sensor)
    }

    fn wake(&mut self) -> Result<(), SensorError> {
        self.command(CMD_WAKEUP)?;
        self.delay.delay_us(WAKEUP_US);
        Ok(())
    }

    fn command(&mut self, command: u16) -> Result<(), SensorError> {
        self.i2c
            .write(self.address, &command.to_be_bytes())
            .map_err(SensorError::bus)
    }
}

impl<I2C: I2c + Send, D: DelayNs + Send> Sensor for Shtc3<I2C, D> {
    fn kind(&self) -> SensorKind {
        SensorKind::Shtc3
    }

    fn read(&mut self) -> Result<MetricValues, SensorError> {
        self.wake()?;
        self.command(CMD_MEASURE)?;
        self.delay.delay_ms(MEASURE_MS);

        let mut buf = [0u8; 6];
        self.i2c.read(self.address, &mut buf).map_err(SensorError::bus)?;
        // Sleep regardless of the CRC outcome
        let slept = self.command(CMD_SLEEP);

        let temperature = checked_word(&buf[0..3])?;
        let humidity = checked_word(&buf[3..6])?;
        slept?;

        let mut values = MetricValues::new();
        values.insert("temperature".to_string(), convert_temperature(temperature));
        values.insert("humidity".to_string(), convert_humidity(humidity));
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::fake::{FakeBus, NoDelay};
    use crate::sensors::sensirion_crc8;

    fn word(value: u16) -> Vec<u8> {
        let [msb, lsb] = value.to_be_bytes();
        vec![msb, lsb, sensirion_crc8(&[msb, lsb])]
    }

    fn bus_with_shtc3() -> FakeBus {
        let bus = FakeBus::with_device(DEFAULT_ADDRESS);
        bus.respond(DEFAULT_ADDRESS, CMD_READ_ID, word(0x0887));
        bus
    }

    #[test]
    fn test_conversions() {
        assert!((convert_temperature(0) + 45.0).abs() < 1e-9);
        assert!((convert_temperature(0x6666) - 25.0).abs() < 0.01);
        assert!((convert_humidity(0x8000) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_measure() {
        let bus = bus_with_shtc3();
        let mut response = word(0x6666);
        response.extend(word(0x8000));
        bus.respond(DEFAULT_ADDRESS, CMD_MEASURE, response);

        let mut sensor = Shtc3::new(bus.clone(), NoDelay, DEFAULT_ADDRESS).unwrap();
        let values = sensor.read().unwrap();
        assert!((values["temperature"] - 25.0).abs() < 0.01);
        assert!((values["humidity"] - 50.0).abs() < 1e-9);

        // Ends asleep
        let last = bus.writes().last().cloned().unwrap();
        assert_eq!(last, (DEFAULT_ADDRESS, CMD_SLEEP.to_be_bytes().to_vec()));
    }

    #[test]
    fn test_bad_crc() {
        let bus = bus_with_shtc3();
        let mut response = word(0x6666);
        response.extend([0x80, 0x00, 0x00]);
        bus.respond(DEFAULT_ADDRESS, CMD_MEASURE, response);

        let mut sensor = Shtc3::new(bus, NoDelay, DEFAULT_ADDRESS).unwrap();
        assert!(matches!(sensor.read(), Err(SensorError::Crc)));
    }

    #[test]
    fn test_wrong_id() {
        let bus = FakeBus::with_device(DEFAULT_ADDRESS);
        bus.respond(DEFAULT_ADDRESS, CMD_READ_ID, word(0x0000));
        assert!(matches!(
            Shtc3::new(bus, NoDelay, DEFAULT_ADDRESS),
            Err(SensorError::ChipId { .. })
        ));
    }

    #[test]
    fn test_not_present() {
        assert!(matches!(
            Shtc3::new(FakeBus::default(), NoDelay, DEFAULT_ADDRESS),
            Err(SensorError::NotDetected(0x70))
        ));
    }
}
