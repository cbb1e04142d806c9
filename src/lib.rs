//! # qwiic-monitor
//!
//! Terminal dashboard and data logger for SparkFun Qwiic I2C sensors (BME280,
//! SGP40, SHTC3, VCNL4040) and u-blox GPS receivers speaking NMEA.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  worker threads                        UI thread              │
//! │  ┌──────────────┐                                             │
//! │  │ SensorPoller │──┐                 ┌─────┐    ┌────┐        │
//! │  └──────────────┘  │  MessageSink    │ app │───▶│ ui │        │
//! │  ┌──────────────┐  ├──────────────▶  │     │    └────┘        │
//! │  │  GpsReader   │──┤  ChannelSource  │     │───▶ GpsSession   │
//! │  └──────────────┘  │                 └──┬──┘    (trips, logs) │
//! │  ┌──────────────┐  │                    │                     │
//! │  │  Playback    │──┘       Control ◀────┘                     │
//! │  └──────────────┘                                             │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`sensors`]**: `embedded-hal` drivers, mock data and the [`sensors::SensorSuite`]
//! - **[`poller`]**: background thread that reads, logs and publishes sensor data
//! - **[`logging`]**: daily CSV logs, archiving, rotating files and diagnostics
//! - **[`gps`]**: NMEA parsing, serial/mock readers, trips, geofences, analysis, playback
//! - **[`source`]**: the [`DataSource`] trait and the channel between workers and UI
//! - **[`data`]**: sensor catalog, readings, history and status messages
//! - **[`settings`]**: layered JSON settings
//! - **[`app`]**, **[`events`]**, **[`ui`]**: the ratatui front end
//!
//! ## Usage
//!
//! ```bash
//! # Sensor dashboard on /dev/i2c-1 (build with --features hardware)
//! qwiic-monitor sensors
//!
//! # GPS dashboard on a serial receiver
//! qwiic-monitor gps --port /dev/ttyACM0 --baud 115200
//!
//! # No hardware: generated data, printed to stdout
//! qwiic-monitor --mock --headless --duration 30s sensors
//!
//! # Analyze a recorded trip
//! qwiic-monitor analyze logs/trips/trip_20240501_101500.csv
//! ```
//!
//! ### As a library
//!
//! ```
//! use qwiic_monitor::{ChannelSource, DataSource};
//! use qwiic_monitor::sensors::{I2cBusProvider, SensorSuite};
//!
//! let (sink, mut source) = ChannelSource::create("mock");
//! let mut suite = SensorSuite::new(Box::new(I2cBusProvider::new("/dev/null")), true, Some(7));
//! let (reading, _) = suite.read_all(chrono::Local::now());
//! sink.send(qwiic_monitor::source::Message::Reading(reading));
//! assert!(source.poll().is_some());
//! ```

pub mod app;
pub mod data;
pub mod error;
pub mod events;
pub mod gps;
pub mod logging;
pub mod poller;
pub mod sensors;
pub mod settings;
pub mod source;
pub mod ui;

// Re-export main types for convenience
pub use app::App;
pub use settings::Settings;
pub use source::{ChannelSource, DataSource, MessageSink};
