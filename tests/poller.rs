//! End-to-end sensor pipeline: poller thread to channel to consumer.

use std::sync::mpsc;
use std::time::{Duration, Instant};

use chrono::Local;
use qwiic_monitor::data::{MetricValues, Reading, SensorKind, StatusLevel, StatusMessage};
use qwiic_monitor::error::SensorError;
use qwiic_monitor::logging::DataLogger;
use qwiic_monitor::poller::{Control, SensorPoller};
use qwiic_monitor::sensors::{I2cBusProvider, Sensor, SensorSuite};
use qwiic_monitor::settings::SensorSettings;
use qwiic_monitor::source::Message;
use qwiic_monitor::{ChannelSource, DataSource};
use tempfile::TempDir;

fn settings(dir: &TempDir) -> SensorSettings {
    SensorSettings {
        log_path: dir.path().join("Sensor_Logs"),
        archive_path: dir.path().join("Archive_Sensor_Logs"),
        mock_data_enabled: true,
        mock_seed: Some(11),
        min_free_disk_mb: 0,
        ..SensorSettings::default()
    }
}

/// Drain `source` until `done` says stop or the deadline passes.
fn collect_until(
    source: &mut ChannelSource,
    timeout: Duration,
    mut done: impl FnMut(&[Reading], &[StatusMessage]) -> bool,
) -> (Vec<Reading>, Vec<StatusMessage>) {
    let deadline = Instant::now() + timeout;
    let mut readings = Vec::new();
    let mut statuses = Vec::new();
    while Instant::now() < deadline && !done(&readings, &statuses) {
        match source.poll() {
            Some(Message::Reading(r)) => readings.push(r),
            Some(Message::Status(s)) => statuses.push(s),
            Some(_) => {}
            None => std::thread::sleep(Duration::from_millis(10)),
        }
    }
    (readings, statuses)
}

fn start(config: &SensorSettings, interval: Duration) -> (qwiic_monitor::poller::PollerHandle, ChannelSource) {
    let suite = SensorSuite::new(
        Box::new(I2cBusProvider::new("/dev/i2c-test")),
        config.mock_data_enabled,
        config.mock_seed,
    );
    let (logger, _) = DataLogger::new(config, Local::now());
    let (sink, source) = ChannelSource::create("sensors");
    let handle = SensorPoller::spawn(suite, logger, interval, sink).unwrap();
    (handle, source)
}

#[test]
fn test_poller_publishes_and_logs_mock_readings() {
    let dir = TempDir::new().unwrap();
    let config = settings(&dir);
    let (mut handle, mut source) = start(&config, Duration::from_millis(50));

    let (readings, statuses) = collect_until(&mut source, Duration::from_secs(5), |r, _| r.len() >= 3);
    assert!(readings.len() >= 3);
    assert_eq!(statuses[0].text, "Sensor thread started.");

    for reading in &readings {
        let t = reading.value(SensorKind::Bme280, "temp_c");
        assert!((20.0..=30.0).contains(&t));
        let prox = reading.value(SensorKind::Proximity, "proximity");
        assert_eq!(prox.fract(), 0.0);
    }
    // FIFO
    assert!(readings.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

    assert!(handle.stop(Duration::from_secs(2)));
    assert!(!handle.is_running());

    let bme_dir = config.log_path.join("bme280");
    let files: Vec<_> = std::fs::read_dir(&bme_dir).unwrap().collect();
    assert_eq!(files.len(), 1);
}

#[test]
fn test_poller_control_messages() {
    let dir = TempDir::new().unwrap();
    let config = settings(&dir);
    let (mut handle, mut source) = start(&config, Duration::from_secs(60));

    // First read is immediate even with a long interval
    collect_until(&mut source, Duration::from_secs(5), |r, _| !r.is_empty());

    assert!(handle.send(Control::UpdateReadInterval(0)));
    assert!(handle.send(Control::ArchiveNow));
    let (_, statuses) = collect_until(&mut source, Duration::from_secs(5), |_, s| {
        s.iter().any(|m| m.text.starts_with("Logs archived to"))
    });

    let rejected = statuses
        .iter()
        .find(|m| m.text.starts_with("Invalid read interval"))
        .unwrap();
    assert_eq!(rejected.level, StatusLevel::Danger);
    assert!(statuses.iter().any(|m| m.level == StatusLevel::Success));

    let archives: Vec<_> = std::fs::read_dir(&config.archive_path).unwrap().collect();
    assert_eq!(archives.len(), 1);

    assert!(handle.stop(Duration::from_secs(2)));
    let (_, statuses) = collect_until(&mut source, Duration::from_secs(1), |_, s| {
        s.iter().any(|m| m.text == "Sensor thread stopped.")
    });
    assert!(statuses.iter().any(|m| m.text == "Sensor thread stopped."));
}

#[test]
fn test_poller_mock_toggle_and_log_settings() {
    let dir = TempDir::new().unwrap();
    let config = settings(&dir);
    let (mut handle, mut source) = start(&config, Duration::from_secs(60));
    collect_until(&mut source, Duration::from_secs(5), |r, _| !r.is_empty());

    // No bus here, so leaving mock mode falls straight back to mock data
    assert!(handle.send(Control::SetMockData(false)));
    let (readings, statuses) = collect_until(&mut source, Duration::from_secs(5), |r, _| !r.is_empty());
    assert!(statuses.iter().any(|m| m.text == "Mock data mode disabled"));
    assert!(statuses
        .iter()
        .any(|m| m.level == StatusLevel::Warning && m.text.ends_with("(mocking).")));
    assert!(readings[0].value(SensorKind::Bme280, "temp_c").is_finite());

    let mut moved = config.clone();
    moved.log_path = dir.path().join("Moved_Logs");
    assert!(handle.send(Control::UpdateLogSettings(moved.clone())));
    assert!(handle.send(Control::SetMockData(true)));
    let (readings, statuses) = collect_until(&mut source, Duration::from_secs(5), |r, _| !r.is_empty());
    assert!(statuses.iter().any(|m| m.text == "Logging configuration updated."));
    assert!(statuses.iter().any(|m| m.text == "Mock data mode enabled"));
    assert_eq!(readings.len(), 1);

    let day = readings[0].timestamp.format("%Y-%m-%d");
    assert!(moved
        .log_path
        .join("bme280")
        .join(format!("bme280_{}.csv", day))
        .exists());

    assert!(handle.stop(Duration::from_secs(2)));
}

/// Blocks in `read` until released, like a hung I2C transaction.
struct StuckSensor {
    entered: mpsc::Sender<()>,
    release: mpsc::Receiver<()>,
}

impl Sensor for StuckSensor {
    fn kind(&self) -> SensorKind {
        SensorKind::Bme280
    }

    fn read(&mut self) -> Result<MetricValues, SensorError> {
        let _ = self.entered.send(());
        let _ = self.release.recv_timeout(Duration::from_secs(10));
        Err(SensorError::Crc)
    }
}

#[test]
fn test_poller_stop_times_out_on_blocked_read() {
    let dir = TempDir::new().unwrap();
    let config = settings(&dir);
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let sensor = StuckSensor {
        entered: entered_tx,
        release: release_rx,
    };
    let suite = SensorSuite::with_sensors(vec![Box::new(sensor) as Box<dyn Sensor>], None);
    let (logger, _) = DataLogger::new(&config, Local::now());
    let (sink, mut source) = ChannelSource::create("sensors");
    let mut handle = SensorPoller::spawn(suite, logger, Duration::from_secs(60), sink).unwrap();

    entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    let started = Instant::now();
    assert!(!handle.stop(Duration::from_millis(100)));
    assert!(started.elapsed() < Duration::from_secs(2));
    // A second stop has nothing left to wait for
    assert!(handle.stop(Duration::from_millis(100)));

    // Once the read returns the thread winds down on its own
    release_tx.send(()).unwrap();
    let (readings, statuses) = collect_until(&mut source, Duration::from_secs(5), |_, s| {
        s.iter().any(|m| m.text == "Sensor thread stopped.")
    });
    assert!(statuses.iter().any(|m| m.text == "Sensor thread stopped."));
    assert!(readings.iter().all(|r| r.value(SensorKind::Bme280, "temp_c").is_nan()));
}
