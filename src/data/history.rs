//! Bounded reading history for trends and sparklines.

use std::collections::VecDeque;

use chrono::{DateTime, Local, TimeDelta};
use serde::{Deserialize, Serialize};

use super::catalog::SensorKind;
use super::reading::Reading;

/// Default number of readings to keep.
pub const DEFAULT_HISTORY_SIZE: usize = 300;

/// Window of history shown in the trend view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeRange {
    #[default]
    #[serde(rename = "Last 10 minutes")]
    Last10Minutes,
    #[serde(rename = "Last 30 minutes")]
    Last30Minutes,
    #[serde(rename = "Last hour")]
    LastHour,
    #[serde(rename = "Last 6 hours")]
    Last6Hours,
    #[serde(rename = "Last 24 hours")]
    Last24Hours,
    #[serde(rename = "All data")]
    All,
}

impl TimeRange {
    pub const ALL: [TimeRange; 6] = [
        TimeRange::Last10Minutes,
        TimeRange::Last30Minutes,
        TimeRange::LastHour,
        TimeRange::Last6Hours,
        TimeRange::Last24Hours,
        TimeRange::All,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TimeRange::Last10Minutes => "Last 10 minutes",
            TimeRange::Last30Minutes => "Last 30 minutes",
            TimeRange::LastHour => "Last hour",
            TimeRange::Last6Hours => "Last 6 hours",
            TimeRange::Last24Hours => "Last 24 hours",
            TimeRange::All => "All data",
        }
    }

    /// Length of the window, `None` for all data.
    pub fn duration(&self) -> Option<TimeDelta> {
        match self {
            TimeRange::Last10Minutes => Some(TimeDelta::minutes(10)),
            TimeRange::Last30Minutes => Some(TimeDelta::minutes(30)),
            TimeRange::LastHour => Some(TimeDelta::hours(1)),
            TimeRange::Last6Hours => Some(TimeDelta::hours(6)),
            TimeRange::Last24Hours => Some(TimeDelta::hours(24)),
            TimeRange::All => None,
        }
    }

    /// Cycle to the next range.
    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|r| *r == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

/// Ring buffer of the most recent readings.
///
/// Never holds more than `capacity` entries; the oldest reading is evicted
/// first.
#[derive(Debug, Clone)]
pub struct History {
    readings: VecDeque<Reading>,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_SIZE)
    }
}

impl History {
    /// Create an empty history. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            readings: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Append a reading, evicting the oldest when full.
    pub fn push(&mut self, reading: Reading) {
        self.readings.push_back(reading);
        while self.readings.len() > self.capacity {
            self.readings.pop_front();
        }
    }

    /// Change the capacity, dropping the oldest readings if it shrinks.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.readings.len() > self.capacity {
            self.readings.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.readings.clear();
    }

    pub fn latest(&self) -> Option<&Reading> {
        self.readings.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reading> {
        self.readings.iter()
    }

    /// Readings with `timestamp >= now - range`, oldest first.
    pub fn filtered(&self, range: TimeRange, now: DateTime<Local>) -> Vec<&Reading> {
        match range.duration() {
            None => self.readings.iter().collect(),
            Some(window) => {
                let cutoff = now - window;
                self.readings.iter().filter(|r| r.timestamp >= cutoff).collect()
            }
        }
    }

    /// Chart points for one metric: x is seconds relative to `now` (negative
    /// for the past). Missing values are skipped.
    pub fn series(
        &self,
        sensor: SensorKind,
        metric: &str,
        range: TimeRange,
        now: DateTime<Local>,
    ) -> Vec<(f64, f64)> {
        self.filtered(range, now)
            .into_iter()
            .filter_map(|r| {
                let value = r.value(sensor, metric);
                if value.is_finite() {
                    let offset = (r.timestamp - now).num_milliseconds() as f64 / 1000.0;
                    Some((offset, value))
                } else {
                    None
                }
            })
            .collect()
    }

    /// Last `width` values of a metric normalized to 0-7 for 8 bar levels.
    ///
    /// Returns an empty Vec if there's not enough history.
    pub fn sparkline(&self, sensor: SensorKind, metric: &str, width: usize) -> Vec<u8> {
        let values: Vec<f64> = self
            .readings
            .iter()
            .rev()
            .map(|r| r.value(sensor, metric))
            .filter(|v| v.is_finite())
            .take(width)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();

        if values.len() < 2 {
            return Vec::new();
        }

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = max - min;

        values
            .iter()
            .map(|&v| {
                if range <= f64::EPSILON {
                    return 3;
                }
                let normalized = ((v - min) / range * 7.0).round() as u8;
                normalized.min(7)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::reading::{MetricValues, SensorValues};

    fn reading_at(timestamp: DateTime<Local>, temp: f64) -> Reading {
        let mut shtc3 = MetricValues::new();
        shtc3.insert("temperature".to_string(), temp);
        let mut values = SensorValues::new();
        values.insert("shtc3".to_string(), shtc3);
        Reading::new(timestamp, values)
    }

    #[test]
    fn test_history_never_exceeds_capacity() {
        let now = Local::now();
        let mut history = History::new(5);
        for i in 0..100 {
            history.push(reading_at(now + TimeDelta::seconds(i), i as f64));
            assert!(history.len() <= 5);
        }
        assert_eq!(history.len(), 5);
        assert_eq!(history.latest().unwrap().value(SensorKind::Shtc3, "temperature"), 99.0);
        assert_eq!(
            history.iter().next().unwrap().value(SensorKind::Shtc3, "temperature"),
            95.0
        );
    }

    #[test]
    fn test_set_capacity_drops_oldest() {
        let now = Local::now();
        let mut history = History::new(10);
        for i in 0..10 {
            history.push(reading_at(now, i as f64));
        }
        history.set_capacity(3);
        assert_eq!(history.len(), 3);
        let temps: Vec<f64> =
            history.iter().map(|r| r.value(SensorKind::Shtc3, "temperature")).collect();
        assert_eq!(temps, vec![7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_filtered_keeps_window_in_order() {
        let now = Local::now();
        let mut history = History::new(DEFAULT_HISTORY_SIZE);
        for minutes_ago in [45, 31, 29, 10, 5, 0] {
            history.push(reading_at(now - TimeDelta::minutes(minutes_ago), minutes_ago as f64));
        }

        let recent = history.filtered(TimeRange::Last30Minutes, now);
        let temps: Vec<f64> =
            recent.iter().map(|r| r.value(SensorKind::Shtc3, "temperature")).collect();
        assert_eq!(temps, vec![29.0, 10.0, 5.0, 0.0]);
        assert!(recent.iter().all(|r| r.timestamp >= now - TimeDelta::minutes(30)));

        // The boundary itself is included
        let ten = history.filtered(TimeRange::Last10Minutes, now);
        assert_eq!(ten.len(), 3);

        assert_eq!(history.filtered(TimeRange::All, now).len(), 6);
    }

    #[test]
    fn test_series_skips_missing() {
        let now = Local::now();
        let mut history = History::default();
        history.push(reading_at(now - TimeDelta::seconds(10), 20.0));
        history.push(reading_at(now - TimeDelta::seconds(5), f64::NAN));
        history.push(reading_at(now, 21.0));

        let series = history.series(SensorKind::Shtc3, "temperature", TimeRange::All, now);
        assert_eq!(series.len(), 2);
        assert!((series[0].0 + 10.0).abs() < 0.01);
        assert_eq!(series[1].1, 21.0);
    }

    #[test]
    fn test_sparkline_normalization() {
        let now = Local::now();
        let mut history = History::default();
        for t in [10.0, 15.0, 20.0] {
            history.push(reading_at(now, t));
        }
        assert_eq!(history.sparkline(SensorKind::Shtc3, "temperature", 8), vec![0, 4, 7]);
        assert!(history.sparkline(SensorKind::Sgp40, "voc_index", 8).is_empty());
    }

    #[test]
    fn test_time_range_cycle_and_labels() {
        assert_eq!(TimeRange::All.next(), TimeRange::Last10Minutes);
        assert_eq!(TimeRange::LastHour.next(), TimeRange::Last6Hours);
        let json = serde_json::to_string(&TimeRange::Last24Hours).unwrap();
        assert_eq!(json, "\"Last 24 hours\"");
    }
}
