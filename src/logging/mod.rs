//! Everything that writes to disk on the sensor side, plus diagnostics.
//!
//! - [`csv_log`]: per-sensor daily CSV files and archiving ([`DataLogger`])
//! - [`rotating`]: size-bounded files with numbered backups ([`RotatingFile`])
//! - [`diagnostics`]: the `tracing` subscriber behind the debug log
//! - [`disk`]: free space checks

pub mod csv_log;
pub mod diagnostics;
pub mod disk;
pub mod rotating;

pub use csv_log::DataLogger;
pub use rotating::{RotatingFile, SharedRotatingFile};
