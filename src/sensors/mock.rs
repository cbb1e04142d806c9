//! Synthetic readings for running without hardware.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::data::{MetricValues, SensorKind};

/// Uniform random values inside each metric's mock range.
#[derive(Debug)]
pub struct MockGenerator {
    rng: StdRng,
}

impl MockGenerator {
    /// A fixed seed gives a reproducible sequence.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { rng }
    }

    pub fn values(&mut self, kind: SensorKind) -> MetricValues {
        kind.metrics()
            .iter()
            .map(|metric| {
                let value = if metric.integer {
                    self.rng
                        .random_range(metric.mock_min as i64..=metric.mock_max as i64) as f64
                } else {
                    self.rng.random_range(metric.mock_min..=metric.mock_max)
                };
                (metric.key.to_string(), value)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_within_mock_ranges() {
        let mut mock = MockGenerator::new(Some(7));
        for _ in 0..200 {
            for kind in SensorKind::ALL {
                let values = mock.values(kind);
                assert_eq!(values.len(), kind.metrics().len());
                for metric in kind.metrics() {
                    let v = values[metric.key];
                    assert!(
                        v >= metric.mock_min && v <= metric.mock_max,
                        "{} {} = {}",
                        kind,
                        metric.key,
                        v
                    );
                    if metric.integer {
                        assert_eq!(v.fract(), 0.0);
                    }
                }
            }
        }
    }

    #[test]
    fn test_mock_temperature_range() {
        let mut mock = MockGenerator::new(Some(1));
        for _ in 0..500 {
            let t = mock.values(SensorKind::Bme280)["temp_c"];
            assert!((20.0..=30.0).contains(&t));
        }
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = MockGenerator::new(Some(42));
        let mut b = MockGenerator::new(Some(42));
        for _ in 0..10 {
            assert_eq!(a.values(SensorKind::Bme280), b.values(SensorKind::Bme280));
        }
    }
}
