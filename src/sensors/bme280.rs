//! Bosch BME280 temperature, humidity and pressure sensor.
//!
//! Runs in normal mode (x1 oversampling on every channel, 1 s standby) and
//! uses the floating point compensation formulas from the datasheet.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use super::Sensor;
use crate::data::{MetricValues, SensorKind};
use crate::error::SensorError;

/// Qwiic boards strap SDO high.
pub const DEFAULT_ADDRESS: u8 = 0x77;
const CHIP_ID: u8 = 0x60;

const REG_CALIB_00: u8 = 0x88;
const REG_CHIP_ID: u8 = 0xD0;
const REG_RESET: u8 = 0xE0;
const REG_CALIB_26: u8 = 0xE1;
const REG_CTRL_HUM: u8 = 0xF2;
const REG_CTRL_MEAS: u8 = 0xF4;
const REG_CONFIG: u8 = 0xF5;
const REG_DATA: u8 = 0xF7;

const SOFT_RESET: u8 = 0xB6;
/// Humidity oversampling x1.
const CTRL_HUM: u8 = 0x01;
/// Temperature x1, pressure x1, normal mode.
const CTRL_MEAS: u8 = 0x27;
/// 1000 ms standby, filter off.
const CONFIG: u8 = 0xA0;

/// Sea level reference for altitude, Pa.
const SEA_LEVEL_PA: f64 = 101_325.0;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Calibration {
    pub t1: u16,
    pub t2: i16,
    pub t3: i16,
    pub p1: u16,
    pub p2: i16,
    pub p3: i16,
    pub p4: i16,
    pub p5: i16,
    pub p6: i16,
    pub p7: i16,
    pub p8: i16,
    pub p9: i16,
    pub h1: u8,
    pub h2: i16,
    pub h3: u8,
    pub h4: i16,
    pub h5: i16,
    pub h6: i8,
}

impl Calibration {
    /// Decode the 0x88..0xA1 block (26 bytes) and the 0xE1..0xE7 block.
    pub fn from_registers(tp: &[u8; 26], h: &[u8; 7]) -> Self {
        let u = |i: usize| u16::from_le_bytes([tp[i], tp[i + 1]]);
        let s = |i: usize| i16::from_le_bytes([tp[i], tp[i + 1]]);
        Self {
            t1: u(0),
            t2: s(2),
            t3: s(4),
            p1: u(6),
            p2: s(8),
            p3: s(10),
            p4: s(12),
            p5: s(14),
            p6: s(16),
            p7: s(18),
            p8: s(20),
            p9: s(22),
            h1: tp[25],
            h2: i16::from_le_bytes([h[0], h[1]]),
            h3: h[2],
            h4: ((h[3] as i8 as i16) << 4) | (h[4] & 0x0F) as i16,
            h5: ((h[5] as i8 as i16) << 4) | (h[4] >> 4) as i16,
            h6: h[6] as i8,
        }
    }

    /// Returns (temperature °C, t_fine).
    pub fn temperature(&self, adc_t: i32) -> (f64, f64) {
        let adc_t = adc_t as f64;
        let t1 = self.t1 as f64;
        let var1 = (adc_t / 16384.0 - t1 / 1024.0) * self.t2 as f64;
        let var2 = (adc_t / 131072.0 - t1 / 8192.0).powi(2) * self.t3 as f64;
        let t_fine = var1 + var2;
        (t_fine / 5120.0, t_fine)
    }

    /// Pressure in Pa.
    pub fn pressure(&self, adc_p: i32, t_fine: f64) -> f64 {
        let mut var1 = t_fine / 2.0 - 64000.0;
        let mut var2 = var1 * var1 * self.p6 as f64 / 32768.0;
        var2 += var1 * self.p5 as f64 * 2.0;
        var2 = var2 / 4.0 + self.p4 as f64 * 65536.0;
        var1 = (self.p3 as f64 * var1 * var1 / 524288.0 + self.p2 as f64 * var1) / 524288.0;
        var1 = (1.0 + var1 / 32768.0) * self.p1 as f64;
        if var1 == 0.0 {
            return 0.0;
        }
        let mut p = 1048576.0 - adc_p as f64;
        p = (p - var2 / 4096.0) * 6250.0 / var1;
        let var1 = self.p9 as f64 * p * p / 2147483648.0;
        let var2 = p * self.p8 as f64 / 32768.0;
        p + (var1 + var2 + self.p7 as f64) / 16.0
    }

    /// Relative humidity in %, clamped to 0..=100.
    pub fn humidity(&self, adc_h: i32, t_fine: f64) -> f64 {
        let mut h = t_fine - 76800.0;
        h = (adc_h as f64 - (self.h4 as f64 * 64.0 + self.h5 as f64 / 16384.0 * h))
            * (self.h2 as f64 / 65536.0
                * (1.0 + self.h6 as f64 / 67108864.0 * h * (1.0 + self.h3 as f64 / 67108864.0 * h)));
        h *= 1.0 - self.h1 as f64 * h / 524288.0;
        h.clamp(0.0, 100.0)
    }
}

/// Altitude in metres from pressure in Pa.
pub fn altitude_m(pressure_pa: f64) -> f64 {
    -45846.2 * ((pressure_pa / SEA_LEVEL_PA).powf(0.190263) - 1.0)
}

/// Dew point in °C from temperature (°C) and relative humidity (%).
pub fn dew_point_c(celsius: f64, humidity: f64) -> f64 {
    let ratio = 373.15 / (273.15 + celsius);
    let mut rhs = -7.90298 * (ratio - 1.0);
    rhs += 5.02808 * ratio.log10();
    rhs += -1.3816e-7 * (10f64.powf(11.344 * (1.0 - 1.0 / ratio)) - 1.0);
    rhs += 8.1328e-3 * (10f64.powf(-3.49149 * (ratio - 1.0)) - 1.0);
    rhs += 1013.246f64.log10();
    let vp = 10f64.powf(rhs - 3.0) * humidity;
    let t = (vp / 0.61078).ln();
    (241.88 * t) / (17.558 - t)
}

fn c_to_f(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

pub struct Bme280<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    calibration: Calibration,
}

impl<I2C: I2c, D: DelayNs> Bme280<I2C, D> {
    /// Reset the device, load calibration and start normal mode.
    pub fn new(i2c: I2C, delay: D, address: u8) -> Result<Self, SensorError> {
        let mut sensor = Self {
            i2c,
            delay,
            address,
            calibration: Calibration::default(),
        };

        let id = sensor.read_register(REG_CHIP_ID).map_err(|_| SensorError::NotDetected(address))?;
        if id != CHIP_ID {
            return Err(SensorError::ChipId {
                expected: CHIP_ID as u16,
                found: id as u16,
            });
        }

        sensor.write_register(REG_RESET, SOFT_RESET)?;
        sensor.delay.delay_ms(2);

        let mut tp = [0u8; 26];
        sensor.read_block(REG_CALIB_00, &mut tp)?;
        let mut h = [0u8; 7];
        sensor.read_block(REG_CALIB_26, &mut h)?;
        sensor.calibration = Calibration::from_registers(&tp, &h);

        // ctrl_hum only latches after a write to ctrl_meas
        sensor.write_register(REG_CTRL_HUM, CTRL_HUM)?;
        sensor.write_register(REG_CONFIG, CONFIG)?;
        sensor.write_register(REG_CTRL_MEAS, CTRL_MEAS)?;
        Ok(sensor)
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    fn read_register(&mut self, reg: u8) -> Result<u8, SensorError> {
        let mut buf = [0u8; 1];
        self.read_block(reg, &mut buf)?;
        Ok(buf[0])
    }

    fn read_block(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), SensorError> {
        self.i2c.write_read(self.address, &[reg], buf).map_err(SensorError::bus)
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), SensorError> {
        self.i2c.write(self.address, &[reg, value]).map_err(SensorError::bus)
    }
}

impl<I2C: I2c + Send, D: DelayNs + Send> Sensor for Bme280<I2C, D> {
    fn kind(&self) -> SensorKind {
        SensorKind::Bme280
    }

    fn read(&mut self) -> Result<MetricValues, SensorError> {
        let mut data = [0u8; 8];
        self.read_block(REG_DATA, &mut data)?;

        let adc_p = ((data[0] as i32) << 12) | ((data[1] as i32) << 4) | ((data[2] as i32) >> 4);
        let adc_t = ((data[3] as i32) << 12) | ((data[4] as i32) << 4) | ((data[5] as i32) >> 4);
        let adc_h = ((data[6] as i32) << 8) | data[7] as i32;

        let (temp_c, t_fine) = self.calibration.temperature(adc_t);
        let pressure_pa = self.calibration.pressure(adc_p, t_fine);
        let humidity = self.calibration.humidity(adc_h, t_fine);
        let dewpoint_c = dew_point_c(temp_c, humidity);

        let mut values = MetricValues::new();
        values.insert("temp_c".to_string(), temp_c);
        values.insert("humidity".to_string(), humidity);
        values.insert("pressure".to_string(), pressure_pa / 100.0);
        values.insert("altitude".to_string(), altitude_m(pressure_pa));
        values.insert("temp_f".to_string(), c_to_f(temp_c));
        values.insert("dewpoint_c".to_string(), dewpoint_c);
        values.insert("dewpoint_f".to_string(), c_to_f(dewpoint_c));
        Ok(values)
    }
}
