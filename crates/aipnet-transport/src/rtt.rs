//! Jacobson/Karels RTT estimation (spec §4.15, RFC 6298-style).

use std::time::Duration;

const ALPHA: f64 = 1.0 / 8.0;
const BETA: f64 = 1.0 / 4.0;

/// Smoothed RTT and RTT variance estimator. Samples from retransmitted
/// frames must be excluded by the caller (Karn's algorithm).
#[derive(Debug, Clone, Copy)]
pub struct RttEstimator {
    smoothed: Option<Duration>,
    variance: Duration,
    latest: Duration,
    min: Duration,
}

impl Default for RttEstimator {
    fn default() -> Self {
        Self {
            smoothed: None,
            variance: Duration::ZERO,
            latest: Duration::ZERO,
            min: Duration::MAX,
        }
    }
}

impl RttEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a new round-trip sample. `sample` must not come from a
    /// retransmitted frame.
    pub fn sample(&mut self, sample: Duration) {
        self.latest = sample;
        self.min = self.min.min(sample);

        match self.smoothed {
            None => {
                self.smoothed = Some(sample);
                self.variance = sample / 2;
            }
            Some(smoothed) => {
                let diff = smoothed.abs_diff(sample);
                self.variance = mul_f64(self.variance, 1.0 - BETA) + mul_f64(diff, BETA);
                self.smoothed = Some(mul_f64(smoothed, 1.0 - ALPHA) + mul_f64(sample, ALPHA));
            }
        }
    }

    pub fn smoothed(&self) -> Duration {
        self.smoothed.unwrap_or(self.latest)
    }

    pub fn variance(&self) -> Duration {
        self.variance
    }

    pub fn min(&self) -> Duration {
        if self.min == Duration::MAX {
            Duration::ZERO
        } else {
            self.min
        }
    }

    pub fn latest(&self) -> Duration {
        self.latest
    }

    pub fn has_sample(&self) -> bool {
        self.smoothed.is_some()
    }
}

fn mul_f64(d: Duration, factor: f64) -> Duration {
    Duration::from_secs_f64((d.as_secs_f64() * factor).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_seeds_smoothed_and_half_variance() {
        let mut est = RttEstimator::new();
        est.sample(Duration::from_millis(100));
        assert_eq!(est.smoothed(), Duration::from_millis(100));
        assert_eq!(est.variance(), Duration::from_millis(50));
    }

    #[test]
    fn stable_samples_converge_variance_toward_zero() {
        let mut est = RttEstimator::new();
        for _ in 0..50 {
            est.sample(Duration::from_millis(100));
        }
        assert!(est.variance() < Duration::from_millis(1));
        assert_eq!(est.smoothed(), Duration::from_millis(100));
    }

    #[test]
    fn min_rtt_tracks_lowest_sample() {
        let mut est = RttEstimator::new();
        est.sample(Duration::from_millis(100));
        est.sample(Duration::from_millis(40));
        est.sample(Duration::from_millis(90));
        assert_eq!(est.min(), Duration::from_millis(40));
    }

    #[test]
    fn a_spike_moves_smoothed_less_than_the_raw_jump() {
        let mut est = RttEstimator::new();
        for _ in 0..10 {
            est.sample(Duration::from_millis(100));
        }
        est.sample(Duration::from_millis(500));
        assert!(est.smoothed() < Duration::from_millis(500));
        assert!(est.smoothed() > Duration::from_millis(100));
    }
}
