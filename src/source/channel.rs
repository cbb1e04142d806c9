//! Channel-based data source.
//!
//! Worker threads push messages into an unbounded tokio mpsc channel; the UI
//! takes them out without blocking.

use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{error, info, warn};

use super::{DataSource, Message};
use crate::data::{StatusLevel, StatusMessage};

/// Sending half handed to worker threads.
///
/// Cloneable; sending after the receiving side is gone is a silent no-op.
#[derive(Debug, Clone)]
pub struct MessageSink {
    sender: mpsc::UnboundedSender<Message>,
}

impl MessageSink {
    /// Queue a message. Returns false when the receiver has been dropped.
    pub fn send(&self, message: Message) -> bool {
        self.sender.send(message).is_ok()
    }

    /// Queue a status message and mirror it to the diagnostics log.
    pub fn status(&self, level: StatusLevel, text: impl Into<String>) {
        let message = StatusMessage::new(level, text);
        match level {
            StatusLevel::Info | StatusLevel::Success => info!("{}", message.text),
            StatusLevel::Warning => warn!("{}", message.text),
            StatusLevel::Danger => error!("{}", message.text),
        }
        self.send(Message::Status(message));
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// A data source fed by one or more [`MessageSink`]s.
#[derive(Debug)]
pub struct ChannelSource {
    receiver: mpsc::UnboundedReceiver<Message>,
    description: String,
    disconnected: bool,
}

impl ChannelSource {
    /// Create a new channel source.
    ///
    /// # Arguments
    ///
    /// * `receiver` - The receiving end of an unbounded channel
    /// * `source_description` - Where messages come from (e.g., "i2c:/dev/i2c-1")
    pub fn new(receiver: mpsc::UnboundedReceiver<Message>, source_description: &str) -> Self {
        Self {
            receiver,
            description: source_description.to_string(),
            disconnected: false,
        }
    }

    /// Create a channel pair.
    ///
    /// Returns (sink, source) where the sink is given to worker threads and
    /// the source to the UI.
    pub fn create(source_description: &str) -> (MessageSink, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (MessageSink { sender }, Self::new(receiver, source_description))
    }
}

impl DataSource for ChannelSource {
    fn poll(&mut self) -> Option<Message> {
        match self.receiver.try_recv() {
            Ok(message) => Some(message),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.disconnected = true;
                None
            }
        }
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<&str> {
        if self.disconnected {
            Some("all workers have stopped")
        } else {
            None
        }
    }
}
