//! Data models for sensor readings.
//!
//! ## Submodules
//!
//! - [`catalog`]: Supported sensors and their metrics ([`SensorKind`], [`MetricInfo`])
//! - [`duration`]: Parsing and formatting of duration strings (e.g., "5s", "24h")
//! - [`history`]: Bounded reading history with time-range filtering
//! - [`reading`]: Timestamped readings ([`Reading`])
//! - [`status`]: Status messages and health levels
//!
//! ## Data Flow
//!
//! ```text
//! SensorSuite::read_all()
//!        │
//!        ▼
//! Reading (all sensors, NaN for missing)
//!        │
//!        ├──▶ DataLogger::log_reading() (CSV)
//!        │
//!        └──▶ History::push() (trends, sparklines)
//! ```

pub mod catalog;
pub mod duration;
pub mod history;
pub mod reading;
pub mod status;

pub use catalog::{MetricInfo, SensorKind};
pub use history::{History, TimeRange, DEFAULT_HISTORY_SIZE};
pub use reading::{missing_values, MetricValues, Reading, SensorValues};
pub use status::{HealthStatus, Notice, StatusLevel, StatusMessage};
