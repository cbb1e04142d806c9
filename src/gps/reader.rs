//! Background thread that turns a receiver's NMEA stream into fixes.
//!
//! Two sources feed the same line handler: a serial port, and a synthetic
//! track that writes NMEA sentences for running without a receiver.

use std::io::{self, BufRead, BufReader};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use super::geo::EARTH_RADIUS_M;
use super::nmea::{checksum, NmeaAccumulator};
use crate::data::StatusLevel;
use crate::source::{Message, MessageSink};

/// Wait between attempts to reopen a failed port.
pub const RETRY_DELAY: Duration = Duration::from_secs(2);
const READ_TIMEOUT: Duration = Duration::from_millis(500);
/// Mock fixes per second.
pub const MOCK_RATE_HZ: u32 = 5;
const STOP_CHECK: Duration = Duration::from_millis(100);
const MPS_TO_KNOTS: f64 = 1.0 / 0.514444;

/// Running reader thread.
#[derive(Debug)]
pub struct GpsReader {
    description: String,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl GpsReader {
    /// Read NMEA from a serial port. Open and read failures are reported and
    /// retried after [`RETRY_DELAY`] until stopped.
    pub fn spawn_serial(port: &str, baud_rate: u32, sink: MessageSink) -> io::Result<Self> {
        let description = format!("{} @ {}", port, baud_rate);
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let port = port.to_string();
        let thread = thread::Builder::new()
            .name("gps-serial".to_string())
            .spawn(move || run_serial(&port, baud_rate, &sink, &flag))?;
        Ok(Self {
            description,
            running,
            thread: Some(thread),
        })
    }

    /// Synthetic random-walk track at [`MOCK_RATE_HZ`].
    pub fn spawn_mock(seed: Option<u64>, sink: MessageSink) -> io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let thread = thread::Builder::new()
            .name("gps-mock".to_string())
            .spawn(move || run_mock(seed, &sink, &flag))?;
        Ok(Self {
            description: "mock GPS".to_string(),
            running,
            thread: Some(thread),
        })
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Signal the thread and wait up to `timeout`. Returns whether it exited.
    pub fn stop(&mut self, timeout: Duration) -> bool {
        self.running.store(false, Ordering::SeqCst);
        let Some(thread) = self.thread.take() else {
            return true;
        };
        let deadline = Instant::now() + timeout;
        while !thread.is_finished() {
            if Instant::now() >= deadline {
                warn!("GPS reader did not stop within {:?}", timeout);
                return false;
            }
            thread::sleep(Duration::from_millis(10));
        }
        thread.join().is_ok()
    }
}

impl Drop for GpsReader {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Publish one raw line and any fix it completes.
fn handle_line(line: &str, accumulator: &mut NmeaAccumulator, sink: &MessageSink) {
    let line = line.trim();
    if !line.starts_with('$') {
        return;
    }
    sink.send(Message::Nmea(line.to_string()));
    match accumulator.push_line(line) {
        Ok(Some(fix)) => {
            sink.send(Message::Fix(fix));
        }
        Ok(None) => {}
        Err(e) => debug!("Skipping NMEA line: {}", e),
    }
}

/// Read lines until EOF, a hard error, or the stop flag.
///
/// Timeouts are not errors; a partial line is kept until the rest arrives.
pub(crate) fn pump_lines<R: BufRead>(
    reader: &mut R,
    accumulator: &mut NmeaAccumulator,
    sink: &MessageSink,
    running: &AtomicBool,
) -> io::Result<()> {
    let mut buf = Vec::new();
    while running.load(Ordering::SeqCst) {
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => return Ok(()),
            Ok(_) => {
                if buf.ends_with(b"\n") {
                    handle_line(&String::from_utf8_lossy(&buf), accumulator, sink);
                    buf.clear();
                }
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut || e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn sleep_while_running(duration: Duration, running: &AtomicBool) {
    let deadline = Instant::now() + duration;
    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep((deadline - now).min(STOP_CHECK));
    }
}

fn run_serial(port: &str, baud_rate: u32, sink: &MessageSink, running: &AtomicBool) {
    info!("GPS reader starting on {} @ {}", port, baud_rate);
    while running.load(Ordering::SeqCst) {
        let opened = serialport::new(port, baud_rate)
            .timeout(READ_TIMEOUT)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .open();

        match opened {
            Ok(serial) => {
                sink.status(StatusLevel::Success, format!("Connected to GPS on {}", port));
                let mut reader = BufReader::new(serial);
                let mut accumulator = NmeaAccumulator::new();
                match pump_lines(&mut reader, &mut accumulator, sink, running) {
                    Ok(()) if !running.load(Ordering::SeqCst) => break,
                    Ok(()) => sink.status(StatusLevel::Warning, format!("GPS port {} closed", port)),
                    Err(e) => sink.status(StatusLevel::Danger, format!("GPS read error on {}: {}", port, e)),
                }
            }
            Err(e) => {
                sink.status(StatusLevel::Danger, format!("Failed to open GPS port {}: {}", port, e));
            }
        }
        sleep_while_running(RETRY_DELAY, running);
    }
    info!("GPS reader on {} stopped", port);
}

fn run_mock(seed: Option<u64>, sink: &MessageSink, running: &AtomicBool) {
    sink.status(StatusLevel::Info, "Using mock GPS data");
    let mut track = MockTrack::new(seed);
    let mut accumulator = NmeaAccumulator::new();
    let period = Duration::from_secs(1) / MOCK_RATE_HZ;
    let mut next = Instant::now();

    while running.load(Ordering::SeqCst) {
        for line in track.step(Utc::now(), period.as_secs_f64()) {
            handle_line(&line, &mut accumulator, sink);
        }
        next += period;
        sleep_while_running(next.saturating_duration_since(Instant::now()), running);
    }
}

/// Random-walk vehicle that reports itself as NMEA sentences.
#[derive(Debug)]
pub struct MockTrack {
    rng: StdRng,
    lat: f64,
    lon: f64,
    altitude: f64,
    speed: f64,
    heading: f64,
}

impl MockTrack {
    /// Starts near Niwot, Colorado.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            rng,
            lat: 40.0906,
            lon: -105.1848,
            altitude: 1560.0,
            speed: 10.0,
            heading: 90.0,
        }
    }

    pub fn position(&self) -> (f64, f64) {
        (self.lat, self.lon)
    }

    /// Advance `dt` seconds and return one epoch of sentences.
    pub fn step(&mut self, now: DateTime<Utc>, dt: f64) -> Vec<String> {
        self.speed = (self.speed + self.rng.random_range(-1.0..=1.0)).clamp(0.0, 30.0);
        self.heading = (self.heading + self.rng.random_range(-5.0..=5.0)).rem_euclid(360.0);
        self.altitude += self.rng.random_range(-0.5..=0.5);

        let distance = self.speed * dt;
        let bearing = self.heading.to_radians();
        self.lat += (distance * bearing.cos() / EARTH_RADIUS_M).to_degrees();
        self.lon += (distance * bearing.sin() / (EARTH_RADIUS_M * self.lat.to_radians().cos())).to_degrees();

        let num_sv: u32 = self.rng.random_range(8..=14);
        let hdop = self.rng.random_range(0.6..=1.2);
        let pdop = hdop + self.rng.random_range(0.2..=0.6);
        let vdop = self.rng.random_range(0.8..=1.5);
        let sigma = self.rng.random_range(0.5..=2.0);

        let time = now.format("%H%M%S%.3f").to_string();
        let time = &time[..time.len() - 1];
        let date = now.format("%d%m%y");
        let (lat, ns) = nmea_coordinate(self.lat, 2, 'N', 'S');
        let (lon, ew) = nmea_coordinate(self.lon, 3, 'E', 'W');

        let mut sentences = vec![
            format!(
                "GNGSA,A,3,01,02,03,04,05,06,07,08,,,,,{:.2},{:.2},{:.2}",
                pdop, hdop, vdop
            ),
            format!(
                "GNGST,{},{:.1},{:.1},{:.1},0.0,{:.2},{:.2},{:.2}",
                time,
                sigma,
                sigma,
                sigma,
                sigma * 0.7,
                sigma * 0.7,
                sigma * 1.5
            ),
        ];
        sentences.extend(self.gsv(num_sv));
        sentences.push(format!(
            "GNRMC,{},A,{},{},{},{},{:.3},{:.2},{},,,A",
            time,
            lat,
            ns,
            lon,
            ew,
            self.speed * MPS_TO_KNOTS,
            self.heading,
            date
        ));
        sentences.push(format!(
            "GNGGA,{},{},{},{},{},1,{:02},{:.2},{:.1},M,-21.0,M,,",
            time, lat, ns, lon, ew, num_sv, hdop, self.altitude
        ));

        sentences
            .into_iter()
            .map(|body| format!("${}*{:02X}", body, checksum(&body)))
            .collect()
    }

    fn gsv(&mut self, count: u32) -> Vec<String> {
        let sats: Vec<String> = (1..=count)
            .map(|prn| {
                format!(
                    "{:02},{:02},{:03},{:02}",
                    prn,
                    self.rng.random_range(10..=85),
                    self.rng.random_range(0..360),
                    self.rng.random_range(25..=48)
                )
            })
            .collect();
        let total = sats.len().div_ceil(4);
        sats.chunks(4)
            .enumerate()
            .map(|(i, chunk)| format!("GPGSV,{},{},{:02},{}", total, i + 1, count, chunk.join(",")))
            .collect()
    }
}

/// Decimal degrees to `(ddmm.mmmmm, hemisphere)`.
fn nmea_coordinate(value: f64, degree_digits: usize, positive: char, negative: char) -> (String, char) {
    let hemisphere = if value < 0.0 { negative } else { positive };
    let value = value.abs();
    let degrees = value.trunc();
    let minutes = (value - degrees) * 60.0;
    (
        format!("{:0width$}{:08.5}", degrees as u32, minutes, width = degree_digits),
        hemisphere,
    )
}
