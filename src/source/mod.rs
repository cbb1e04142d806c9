//! Message plumbing between background workers and the UI loop.
//!
//! Workers (sensor poller, GPS reader, playback) run on their own OS threads
//! and push [`Message`]s through a [`MessageSink`]. The UI loop drains a
//! [`DataSource`] on a short timer. Delivery is FIFO per sink and nothing is
//! dropped while the receiver is alive.

mod channel;

pub use channel::{ChannelSource, MessageSink};

use std::fmt::Debug;

use crate::data::{Reading, StatusMessage};
use crate::gps::GpsFix;

/// Everything a worker can report.
#[derive(Debug, Clone)]
pub enum Message {
    /// A complete sensor poll.
    Reading(Reading),
    /// Human readable status from any worker.
    Status(StatusMessage),
    /// A live fix from the receiver (or the mock track).
    Fix(GpsFix),
    /// A fix replayed from a recorded log.
    ReplayFix(GpsFix),
    /// One raw NMEA sentence.
    Nmea(String),
}

/// Trait for receiving worker messages.
///
/// # Example
///
/// ```
/// use qwiic_monitor::{ChannelSource, DataSource};
/// use qwiic_monitor::data::StatusLevel;
///
/// let (sink, mut source) = ChannelSource::create("sensors");
/// sink.status(StatusLevel::Info, "hello");
/// assert!(source.poll().is_some());
/// ```
pub trait DataSource: Send + Debug {
    /// Take the next queued message.
    ///
    /// Returns `None` when nothing is queued. This method must not block.
    fn poll(&mut self) -> Option<Message>;

    /// Returns a human-readable description of the source.
    ///
    /// Used for display in the TUI status bar.
    fn description(&self) -> &str;

    /// Returns an error message once the source can no longer deliver data.
    fn error(&self) -> Option<&str>;
}
