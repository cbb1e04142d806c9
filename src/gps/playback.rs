//! Replay of recorded GPS tracks.
//!
//! A loaded track is published point by point as [`Message::ReplayFix`] on a
//! background thread, one point every 200 ms divided by the playback speed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info};

use super::analysis::{load_trip_points, TripPoint};
use super::fix::GpsFix;
use crate::data::StatusLevel;
use crate::error::TripError;
use crate::source::{Message, MessageSink};

/// Delay between points at 1x.
pub const BASE_INTERVAL: Duration = Duration::from_millis(200);
const MIN_SPEED: f64 = 0.1;
const MAX_SPEED: f64 = 20.0;
const TICK: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    NoData,
    Ready,
    Playing,
    Paused,
    Stopped,
}

impl PlaybackState {
    pub fn label(&self) -> &'static str {
        match self {
            PlaybackState::NoData => "No data",
            PlaybackState::Ready => "Ready",
            PlaybackState::Playing => "Playing",
            PlaybackState::Paused => "Paused",
            PlaybackState::Stopped => "Stopped",
        }
    }
}

#[derive(Debug)]
struct Shared {
    state: PlaybackState,
    points: Vec<TripPoint>,
    index: usize,
    speed: f64,
    /// Set while a worker thread is running. Cleared by the worker under the
    /// lock on its way out.
    worker_alive: bool,
}

#[derive(Debug)]
pub struct PlaybackManager {
    shared: Arc<Mutex<Shared>>,
    sink: MessageSink,
    file: Option<PathBuf>,
    thread: Option<JoinHandle<()>>,
}

impl PlaybackManager {
    pub fn new(sink: MessageSink) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                state: PlaybackState::NoData,
                points: Vec::new(),
                index: 0,
                speed: 1.0,
                worker_alive: false,
            })),
            sink,
            file: None,
            thread: None,
        }
    }

    /// Load a CSV or JSONL track. Any running playback is stopped first.
    ///
    /// Returns the number of points loaded.
    pub fn load_file(&mut self, path: &Path) -> Result<usize, TripError> {
        self.stop();
        let points = load_trip_points(path)?;
        if points.is_empty() {
            return Err(TripError::NoData(path.to_path_buf()));
        }
        let count = points.len();
        {
            let mut shared = self.shared.lock();
            shared.points = points;
            shared.index = 0;
            shared.state = PlaybackState::Ready;
        }
        self.file = Some(path.to_path_buf());
        info!("Loaded {} playback points from {}", count, path.display());
        Ok(count)
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.lock().state
    }

    pub fn speed(&self) -> f64 {
        self.shared.lock().speed
    }

    /// Start or resume. Does nothing without data or while already playing.
    pub fn play(&mut self) -> bool {
        let spawn = {
            let mut shared = self.shared.lock();
            match shared.state {
                PlaybackState::NoData | PlaybackState::Playing => return false,
                PlaybackState::Ready | PlaybackState::Stopped => shared.index = 0,
                PlaybackState::Paused => {}
            }
            shared.state = PlaybackState::Playing;
            let spawn = !shared.worker_alive;
            shared.worker_alive = true;
            spawn
        };

        if spawn {
            if let Some(old) = self.thread.take() {
                let _ = old.join();
            }
            let shared = self.shared.clone();
            let sink = self.sink.clone();
            match thread::Builder::new()
                .name("gps-playback".to_string())
                .spawn(move || run(&shared, &sink))
            {
                Ok(handle) => self.thread = Some(handle),
                Err(e) => {
                    let mut shared = self.shared.lock();
                    shared.state = PlaybackState::Stopped;
                    shared.worker_alive = false;
                    drop(shared);
                    self.sink
                        .status(StatusLevel::Danger, format!("Could not start playback: {}", e));
                    return false;
                }
            }
        }
        self.sink.status(StatusLevel::Info, "Playback started");
        true
    }

    pub fn pause(&mut self) -> bool {
        let mut shared = self.shared.lock();
        if shared.state != PlaybackState::Playing {
            return false;
        }
        shared.state = PlaybackState::Paused;
        drop(shared);
        self.sink.status(StatusLevel::Info, "Playback paused");
        true
    }

    /// Stop and rewind. The loaded track is kept.
    pub fn stop(&mut self) {
        {
            let mut shared = self.shared.lock();
            if matches!(shared.state, PlaybackState::Playing | PlaybackState::Paused) {
                shared.state = PlaybackState::Stopped;
            }
            shared.index = 0;
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }

    /// Clamped to 0.1x..20x.
    pub fn set_speed(&mut self, speed: f64) {
        let speed = if speed.is_finite() { speed.clamp(MIN_SPEED, MAX_SPEED) } else { 1.0 };
        self.shared.lock().speed = speed;
        debug!("Playback speed set to {}x", speed);
    }

    /// `i / n (p%)`.
    pub fn progress(&self) -> String {
        let shared = self.shared.lock();
        let total = shared.points.len();
        if total == 0 {
            return "0 / 0 (0%)".to_string();
        }
        let percent = shared.index as f64 / total as f64 * 100.0;
        format!("{} / {} ({:.0}%)", shared.index, total, percent)
    }
}

impl Drop for PlaybackManager {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Replayed points carry position and motion only.
fn point_to_fix(point: &TripPoint) -> GpsFix {
    GpsFix {
        time: Some(point.timestamp.to_utc()),
        lat: point.lat,
        lon: point.lon,
        ground_speed: point.speed,
        heading: point.heading,
        fix_type: 3,
        ..GpsFix::default()
    }
}

fn run(shared: &Mutex<Shared>, sink: &MessageSink) {
    let mut next = Instant::now();
    loop {
        let fix = {
            let mut state = shared.lock();
            let current = state.state;
            match current {
                PlaybackState::Playing => {}
                PlaybackState::Paused => {
                    drop(state);
                    thread::sleep(TICK);
                    next = Instant::now();
                    continue;
                }
                _ => {
                    state.worker_alive = false;
                    return;
                }
            }
            if Instant::now() < next {
                None
            } else if let Some(point) = state.points.get(state.index) {
                let fix = point_to_fix(point);
                state.index += 1;
                next = Instant::now() + BASE_INTERVAL.div_f64(state.speed);
                Some(fix)
            } else {
                state.state = PlaybackState::Stopped;
                state.index = 0;
                state.worker_alive = false;
                drop(state);
                sink.status(StatusLevel::Info, "Playback finished");
                return;
            }
        };

        match fix {
            Some(fix) => {
                sink.send(Message::ReplayFix(fix));
            }
            None => thread::sleep(next.saturating_duration_since(Instant::now()).min(TICK)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    use crate::source::ChannelSource;
    use crate::DataSource;

    fn write_track(dir: &Path, rows: usize) -> PathBuf {
        let path = dir.join("trip.csv");
        let mut csv = String::from("Timestamp,Latitude,Longitude,Speed (m/s),Heading (deg)\n");
        for i in 0..rows {
            csv.push_str(&format!(
                "2024-05-01T10:00:{:02}.000,40.{:04},-105.0,5.0,90.0\n",
                i, i
            ));
        }
        fs::write(&path, csv).unwrap();
        path
    }

    fn replayed(source: &mut ChannelSource) -> Vec<GpsFix> {
        let mut fixes = Vec::new();
        while let Some(message) = source.poll() {
            if let Message::ReplayFix(fix) = message {
                fixes.push(fix);
            }
        }
        fixes
    }

    #[test]
    fn test_load_rejects_unknown_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("track.gpx");
        fs::write(&path, "<gpx/>").unwrap();

        let (sink, _source) = ChannelSource::create("playback");
        let mut playback = PlaybackManager::new(sink);
        assert!(matches!(playback.load_file(&path), Err(TripError::UnsupportedFormat(_))));
        assert_eq!(playback.state(), PlaybackState::NoData);
        assert!(!playback.play());
    }

    #[test]
    fn test_load_empty_track() {
        let dir = tempdir().unwrap();
        let path = write_track(dir.path(), 0);
        let (sink, _source) = ChannelSource::create("playback");
        let mut playback = PlaybackManager::new(sink);
        assert!(matches!(playback.load_file(&path), Err(TripError::NoData(_))));
    }

    #[test]
    fn test_plays_to_end_in_order() {
        let dir = tempdir().unwrap();
        let path = write_track(dir.path(), 4);
        let (sink, mut source) = ChannelSource::create("playback");
        let mut playback = PlaybackManager::new(sink);

        assert_eq!(playback.load_file(&path).unwrap(), 4);
        assert_eq!(playback.state(), PlaybackState::Ready);
        assert_eq!(playback.progress(), "0 / 4 (0%)");

        playback.set_speed(20.0);
        assert!(playback.play());

        let deadline = Instant::now() + Duration::from_secs(5);
        while playback.state() == PlaybackState::Playing && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(playback.state(), PlaybackState::Stopped);

        let fixes = replayed(&mut source);
        assert_eq!(fixes.len(), 4);
        assert!(fixes.windows(2).all(|w| w[0].lat < w[1].lat));
        assert_eq!(fixes[0].ground_speed, 5.0);
    }

    #[test]
    fn test_pause_and_stop() {
        let dir = tempdir().unwrap();
        let path = write_track(dir.path(), 50);
        let (sink, mut source) = ChannelSource::create("playback");
        let mut playback = PlaybackManager::new(sink);
        playback.load_file(&path).unwrap();

        assert!(!playback.pause());
        assert!(playback.play());
        assert!(!playback.play());
        thread::sleep(Duration::from_millis(50));
        assert!(playback.pause());
        assert_eq!(playback.state(), PlaybackState::Paused);
        // Let a fix taken just before the pause land in the queue
        thread::sleep(Duration::from_millis(30));

        let seen = replayed(&mut source).len();
        thread::sleep(Duration::from_millis(450));
        assert_eq!(replayed(&mut source).len(), 0);
        assert!(seen >= 1);
        assert!(playback.progress().starts_with(&format!("{} / 50", seen)));

        playback.stop();
        assert_eq!(playback.state(), PlaybackState::Stopped);
        assert_eq!(playback.progress(), "0 / 50 (0%)");
    }

    #[test]
    fn test_play_while_previous_worker_exits() {
        let dir = tempdir().unwrap();
        let path = write_track(dir.path(), 3);
        let (sink, mut source) = ChannelSource::create("playback");
        let mut playback = PlaybackManager::new(sink);
        playback.load_file(&path).unwrap();
        playback.set_speed(20.0);

        // A worker that has marked playback finished but not yet returned
        {
            let mut shared = playback.shared.lock();
            shared.state = PlaybackState::Stopped;
            shared.worker_alive = false;
        }
        playback.thread = Some(thread::spawn(|| thread::sleep(Duration::from_millis(50))));

        assert!(playback.play());
        let deadline = Instant::now() + Duration::from_secs(5);
        while playback.state() == PlaybackState::Playing && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(playback.state(), PlaybackState::Stopped);
        assert_eq!(replayed(&mut source).len(), 3);

        // Replaying after a natural finish starts over
        assert!(playback.play());
        let deadline = Instant::now() + Duration::from_secs(5);
        while playback.state() == PlaybackState::Playing && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(replayed(&mut source).len(), 3);
    }

    #[test]
    fn test_speed_clamped() {
        let (sink, _source) = ChannelSource::create("playback");
        let mut playback = PlaybackManager::new(sink);
        playback.set_speed(0.0);
        assert_eq!(playback.speed(), MIN_SPEED);
        playback.set_speed(100.0);
        assert_eq!(playback.speed(), MAX_SPEED);
        playback.set_speed(f64::NAN);
        assert_eq!(playback.speed(), 1.0);
    }
}
