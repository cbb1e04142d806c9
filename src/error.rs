//! Error types for sensors, GPS parsing, trips and archiving.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by sensor drivers.
#[derive(Debug, Error)]
pub enum SensorError {
    /// The underlying I2C transaction failed.
    #[error("I2C bus error: {0}")]
    Bus(String),

    /// Nothing answered at the expected address.
    #[error("sensor not detected at address 0x{0:02X}")]
    NotDetected(u8),

    /// A device answered but identified as something else.
    #[error("unexpected chip id 0x{found:04X} (expected 0x{expected:04X})")]
    ChipId { expected: u16, found: u16 },

    /// A data word failed its CRC check.
    #[error("CRC mismatch in sensor response")]
    Crc,

    /// The binary was built without I2C support.
    #[error("I2C support not compiled in (enable the `hardware` feature)")]
    Unsupported,
}

impl SensorError {
    /// Convert any embedded-hal I2C error into a bus error.
    pub fn bus<E: embedded_hal::i2c::Error>(err: E) -> Self {
        SensorError::Bus(format!("{:?}", err.kind()))
    }
}

/// Errors raised while parsing NMEA sentences.
#[derive(Debug, Error, PartialEq)]
pub enum NmeaError {
    #[error("sentence does not start with '$'")]
    MissingStart,

    #[error("checksum mismatch: expected {expected:02X}, computed {computed:02X}")]
    Checksum { expected: u8, computed: u8 },

    #[error("malformed sentence: {0}")]
    Malformed(String),
}

/// Errors raised by trip recording, trip loading and playback.
#[derive(Debug, Error)]
pub enum TripError {
    #[error("a trip is already being recorded")]
    AlreadyActive,

    #[error("no trip is being recorded")]
    NotActive,

    #[error("no valid GPS position to start a trip")]
    NoFix,

    #[error("unsupported trip file format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("no usable points in {0}")]
    NoData(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while archiving log files.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("log directory {0} does not exist")]
    MissingLogDir(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}
