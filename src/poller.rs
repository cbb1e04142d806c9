//! Background sensor polling thread.
//!
//! The poller owns the [`SensorSuite`] and the [`DataLogger`]. It reads every
//! sensor on a fixed interval, logs the reading, and publishes it through a
//! [`MessageSink`]. The UI talks back with [`Control`] messages.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use tracing::{debug, info};

use crate::data::{Notice, StatusLevel};
use crate::logging::DataLogger;
use crate::sensors::SensorSuite;
use crate::settings::SensorSettings;
use crate::source::{Message, MessageSink};

/// Longest the thread waits before re-checking its stop flag.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Requests from the UI to the poller thread.
#[derive(Debug, Clone)]
pub enum Control {
    UpdateLogSettings(SensorSettings),
    ArchiveNow,
    /// New read interval in seconds. Zero is rejected.
    UpdateReadInterval(u64),
    SetMockData(bool),
    Shutdown,
}

pub struct SensorPoller {
    suite: SensorSuite,
    logger: DataLogger,
    interval: Duration,
    sink: MessageSink,
    control: mpsc::Receiver<Control>,
    running: Arc<AtomicBool>,
}

impl SensorPoller {
    /// Start polling on a new thread. The first read happens immediately.
    pub fn spawn(
        suite: SensorSuite,
        logger: DataLogger,
        interval: Duration,
        sink: MessageSink,
    ) -> io::Result<PollerHandle> {
        let (control_tx, control_rx) = mpsc::channel();
        let running = Arc::new(AtomicBool::new(true));
        let poller = SensorPoller {
            suite,
            logger,
            interval: if interval.is_zero() { Duration::from_secs(1) } else { interval },
            sink,
            control: control_rx,
            running: running.clone(),
        };
        let thread = thread::Builder::new()
            .name("sensor-poller".to_string())
            .spawn(move || poller.run())?;

        Ok(PollerHandle {
            control: control_tx,
            running,
            thread: Some(thread),
        })
    }

    fn run(mut self) {
        self.sink.status(StatusLevel::Info, "Sensor thread started.");
        let notices = self.suite.initialize();
        self.publish(notices);

        let mut next_read = Instant::now();
        while self.running.load(Ordering::SeqCst) {
            let wait = next_read
                .saturating_duration_since(Instant::now())
                .min(POLL_INTERVAL);
            match self.control.recv_timeout(wait) {
                Ok(control) => {
                    self.handle_control(control, &mut next_read);
                    while let Ok(control) = self.control.try_recv() {
                        self.handle_control(control, &mut next_read);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("Control channel closed, stopping poller");
                    self.running.store(false, Ordering::SeqCst);
                }
            }
            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            if Instant::now() >= next_read {
                self.poll_once(Local::now());
                next_read = Instant::now() + self.interval;
            }
        }

        self.logger.close_all();
        self.sink.status(StatusLevel::Info, "Sensor thread stopped.");
    }

    /// Archive check, read, log, publish.
    fn poll_once(&mut self, now: DateTime<Local>) {
        if let Some(result) = self.logger.check_and_archive_auto(now) {
            self.report_archive(result);
        }

        let (reading, notices) = self.suite.read_all(now);
        self.publish(notices);
        let notices = self.logger.log_reading(&reading);
        self.publish(notices);
        self.sink.send(Message::Reading(reading));
    }

    fn handle_control(&mut self, control: Control, next_read: &mut Instant) {
        debug!("Control message: {:?}", control);
        match control {
            Control::UpdateLogSettings(config) => {
                let notices = self.logger.update_config(&config);
                self.publish(notices);
            }
            Control::ArchiveNow => {
                self.sink.status(StatusLevel::Info, "Archiving sensor logs...");
                let result = self.logger.archive_now(Local::now());
                self.report_archive(result);
            }
            Control::UpdateReadInterval(0) => {
                self.sink.status(
                    StatusLevel::Danger,
                    "Invalid read interval: must be a positive number of seconds",
                );
            }
            Control::UpdateReadInterval(secs) => {
                self.interval = Duration::from_secs(secs);
                *next_read = (*next_read).min(Instant::now() + self.interval);
                self.sink.status(
                    StatusLevel::Info,
                    format!("Sensor read interval updated to {} seconds", secs),
                );
            }
            Control::SetMockData(enable) => {
                let notices = self.suite.set_mock(enable);
                self.publish(notices);
                *next_read = Instant::now();
            }
            Control::Shutdown => {
                info!("Shutdown command received in sensor thread");
                self.running.store(false, Ordering::SeqCst);
            }
        }
    }

    fn report_archive(&self, result: Result<Option<std::path::PathBuf>, crate::error::ArchiveError>) {
        match result {
            Ok(Some(path)) => self
                .sink
                .status(StatusLevel::Success, format!("Logs archived to {}", path.display())),
            Ok(None) => self.sink.status(StatusLevel::Info, "No sensor logs to archive"),
            Err(e) => self
                .sink
                .status(StatusLevel::Danger, format!("Error archiving logs: {}", e)),
        }
    }

    fn publish(&self, notices: Vec<Notice>) {
        for (level, text) in notices {
            self.sink.status(level, text);
        }
    }
}

/// Owner side of a running [`SensorPoller`].
#[derive(Debug)]
pub struct PollerHandle {
    control: mpsc::Sender<Control>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Queue a control message. Returns false once the thread has exited.
    pub fn send(&self, control: Control) -> bool {
        self.control.send(control).is_ok()
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Ask the thread to stop and wait up to `timeout` for it.
    ///
    /// Returns whether the thread finished in time. Shutdown proceeds either
    /// way; a thread still blocked in a hardware read is left to finish on
    /// its own.
    pub fn stop(&mut self, timeout: Duration) -> bool {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.control.send(Control::Shutdown);

        let Some(thread) = self.thread.take() else {
            return true;
        };
        let deadline = Instant::now() + timeout;
        while !thread.is_finished() {
            if Instant::now() >= deadline {
                info!("Sensor thread did not stop within {:?}", timeout);
                return false;
            }
            thread::sleep(Duration::from_millis(10));
        }
        thread.join().is_ok()
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}
