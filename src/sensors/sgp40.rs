//! Sensirion SGP40 VOC sensor.
//!
//! The chip only reports a raw signal. [`VocIndexEstimator`] turns it into a
//! 1..=500 VOC index by tracking an adaptive baseline: 100 is the recent
//! average, higher means more VOCs than usual.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use super::{checked_word, sensirion_crc8, Sensor};
use crate::data::{MetricValues, SensorKind};
use crate::error::SensorError;

pub const DEFAULT_ADDRESS: u8 = 0x59;

const CMD_SERIAL: u16 = 0x3682;
const CMD_MEASURE_RAW: u16 = 0x260F;
const CMD_HEATER_OFF: u16 = 0x3615;

const MEASURE_MS: u32 = 30;

/// Compensation words for 50 %RH and 25 °C.
pub const DEFAULT_HUMIDITY_TICKS: u16 = 0x8000;
pub const DEFAULT_TEMPERATURE_TICKS: u16 = 0x6666;

/// Relative humidity (%) and temperature (°C) as sensor ticks.
pub fn compensation_ticks(humidity: f64, temperature: f64) -> (u16, u16) {
    if !humidity.is_finite() || !temperature.is_finite() {
        return (DEFAULT_HUMIDITY_TICKS, DEFAULT_TEMPERATURE_TICKS);
    }
    let rh = humidity.clamp(0.0, 100.0) * 65535.0 / 100.0;
    let t = (temperature.clamp(-45.0, 130.0) + 45.0) * 65535.0 / 175.0;
    (rh.round() as u16, t.round() as u16)
}

/// Adaptive VOC index.
///
/// Keeps exponential moving estimates of the raw signal mean and spread. A
/// raw value at the mean maps to 100; each standard deviation below the mean
/// (more VOCs lower the signal) pushes the index up along a sigmoid capped
/// at 500.
#[derive(Debug, Clone)]
pub struct VocIndexEstimator {
    mean: f64,
    variance: f64,
    samples: u64,
    alpha: f64,
}

impl Default for VocIndexEstimator {
    fn default() -> Self {
        Self::new(0.01)
    }
}

impl VocIndexEstimator {
    const INITIAL_SIGMA: f64 = 50.0;
    const MIN_SIGMA: f64 = 10.0;
    /// Samples taken as-is to seed the baseline.
    const WARMUP: u64 = 10;

    pub fn new(alpha: f64) -> Self {
        Self {
            mean: f64::NAN,
            variance: Self::INITIAL_SIGMA * Self::INITIAL_SIGMA,
            samples: 0,
            alpha: alpha.clamp(1e-6, 1.0),
        }
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Feed one raw sample and return the VOC index for it.
    pub fn process(&mut self, raw: u16) -> f64 {
        let raw = raw as f64;
        self.samples += 1;

        if self.mean.is_nan() {
            self.mean = raw;
            return 100.0;
        }

        let sigma = self.variance.sqrt().max(Self::MIN_SIGMA);
        let index = Self::index(self.mean, sigma, raw);

        let alpha = if self.samples <= Self::WARMUP {
            1.0 / self.samples as f64
        } else {
            self.alpha
        };
        let delta = raw - self.mean;
        self.mean += alpha * delta;
        self.variance = (1.0 - alpha) * (self.variance + alpha * delta * delta);

        index
    }

    fn index(mean: f64, sigma: f64, raw: f64) -> f64 {
        let deviation = (mean - raw) / sigma;
        // 500 / (1 + 4) == 100 at zero deviation
        let index = 500.0 / (1.0 + 4.0 * (-deviation).exp());
        index.clamp(1.0, 500.0)
    }
}

pub struct Sgp40<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    serial: u64,
    humidity_ticks: u16,
    temperature_ticks: u16,
    estimator: VocIndexEstimator,
}

impl<I2C: I2c, D: DelayNs> Sgp40<I2C, D> {
    pub fn new(i2c: I2C, delay: D, address: u8) -> Result<Self, SensorError> {
        let mut sensor = Self {
            i2c,
            delay,
            address,
            serial: 0,
            humidity_ticks: DEFAULT_HUMIDITY_TICKS,
            temperature_ticks: DEFAULT_TEMPERATURE_TICKS,
            estimator: VocIndexEstimator::default(),
        };

        sensor
            .i2c
            .write(address, &CMD_SERIAL.to_be_bytes())
            .map_err(|_| SensorError::NotDetected(address))?;
        sensor.delay.delay_ms(1);
        let mut buf = [0u8; 9];
        sensor.i2c.read(address, &mut buf).map_err(SensorError::bus)?;
        let mut serial = 0u64;
        for chunk in buf.chunks(3) {
            serial = (serial << 16) | checked_word(chunk)? as u64;
        }
        sensor.serial = serial;
        Ok(sensor)
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Raw SRAW ticks with the current compensation.
    pub fn measure_raw(&mut self) -> Result<u16, SensorError> {
        let [rh_msb, rh_lsb] = self.humidity_ticks.to_be_bytes();
        let [t_msb, t_lsb] = self.temperature_ticks.to_be_bytes();
        let [c_msb, c_lsb] = CMD_MEASURE_RAW.to_be_bytes();
        let frame = [
            c_msb,
            c_lsb,
            rh_msb,
            rh_lsb,
            sensirion_crc8(&[rh_msb, rh_lsb]),
            t_msb,
            t_lsb,
            sensirion_crc8(&[t_msb, t_lsb]),
        ];
        self.i2c.write(self.address, &frame).map_err(SensorError::bus)?;
        self.delay.delay_ms(MEASURE_MS);

        let mut buf = [0u8; 3];
        self.i2c.read(self.address, &mut buf).map_err(SensorError::bus)?;
        checked_word(&buf)
    }

    pub fn heater_off(&mut self) -> Result<(), SensorError> {
        self.i2c
            .write(self.address, &CMD_HEATER_OFF.to_be_bytes())
            .map_err(SensorError::bus)
    }
}

impl<I2C: I2c + Send, D: DelayNs + Send> Sensor for Sgp40<I2C, D> {
    fn kind(&self) -> SensorKind {
        SensorKind::Sgp40
    }

    fn read(&mut self) -> Result<MetricValues, SensorError> {
        let raw = self.measure_raw()?;
        let mut values = MetricValues::new();
        values.insert("voc_index".to_string(), self.estimator.process(raw).round());
        Ok(values)
    }

    fn set_compensation(&mut self, humidity: f64, temperature: f64) {
        let (rh, t) = compensation_ticks(humidity, temperature);
        self.humidity_ticks = rh;
        self.temperature_ticks = t;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::fake::{FakeBus, NoDelay};

    fn word(value: u16) -> Vec<u8> {
        let [msb, lsb] = value.to_be_bytes();
        vec![msb, lsb, sensirion_crc8(&[msb, lsb])]
    }

    fn bus_with_sgp40(raw: u16) -> FakeBus {
        let bus = FakeBus::with_device(DEFAULT_ADDRESS);
        let mut serial = word(0x0000);
        serial.extend(word(0x0123));
        serial.extend(word(0x4567));
        bus.respond(DEFAULT_ADDRESS, CMD_SERIAL, serial);
        bus.respond(DEFAULT_ADDRESS, CMD_MEASURE_RAW, word(raw));
        bus
    }

    #[test]
    fn test_compensation_ticks() {
        assert_eq!(compensation_ticks(f64::NAN, 25.0), (0x8000, 0x6666));
        let (rh, t) = compensation_ticks(50.0, 25.0);
        assert!((rh as i32 - 0x8000).abs() <= 1);
        assert!((t as i32 - 0x6666).abs() <= 1);
        assert_eq!(compensation_ticks(150.0, 200.0), (65535, 65535));
    }

    #[test]
    fn test_estimator_baseline_is_100() {
        let mut est = VocIndexEstimator::default();
        for _ in 0..50 {
            assert!((est.process(30000) - 100.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_estimator_rises_on_voc_event() {
        let mut est = VocIndexEstimator::default();
        for i in 0..100 {
            est.process(30000 + (i % 5) * 20);
        }
        // VOCs lower the raw signal
        let spike = est.process(29000);
        assert!(spike > 200.0, "spike {}", spike);
        let clean = est.process(31000);
        assert!(clean < 100.0);
        assert!(clean >= 1.0);
    }

    #[test]
    fn test_estimator_bounded() {
        let mut est = VocIndexEstimator::default();
        est.process(30000);
        for raw in [0u16, 65535, 100, 60000] {
            let index = est.process(raw);
            assert!((1.0..=500.0).contains(&index));
        }
    }

    #[test]
    fn test_read_over_bus() {
        let bus = bus_with_sgp40(30000);
        let mut sensor = Sgp40::new(bus.clone(), NoDelay, DEFAULT_ADDRESS).unwrap();
        assert_eq!(sensor.serial(), 0x0000_0123_4567);
        assert_eq!(sensor.read().unwrap()["voc_index"], 100.0);

        // Default compensation frame
        let frame = bus
            .writes()
            .into_iter()
            .find(|(_, bytes)| bytes.len() == 8)
            .unwrap()
            .1;
        assert_eq!(frame, vec![0x26, 0x0F, 0x80, 0x00, 0xA2, 0x66, 0x66, 0x93]);
    }

    #[test]
    fn test_compensation_applied_to_frame() {
        let bus = bus_with_sgp40(30000);
        let mut sensor = Sgp40::new(bus.clone(), NoDelay, DEFAULT_ADDRESS).unwrap();
        sensor.set_compensation(0.0, -45.0);
        sensor.read().unwrap();
        let frame = bus.writes().last().cloned().unwrap().1;
        assert_eq!(&frame[2..4], &[0x00, 0x00]);
        assert_eq!(&frame[5..7], &[0x00, 0x00]);
    }

    #[test]
    fn test_crc_error() {
        let bus = bus_with_sgp40(30000);
        let mut sensor = Sgp40::new(bus.clone(), NoDelay, DEFAULT_ADDRESS).unwrap();
        bus.respond(DEFAULT_ADDRESS, CMD_MEASURE_RAW, vec![0x75, 0x30, 0x00]);
        assert!(matches!(sensor.read(), Err(SensorError::Crc)));
    }
}
