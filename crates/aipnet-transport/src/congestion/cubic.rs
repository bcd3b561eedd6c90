//! CUBIC congestion control, RFC 8312 (spec §4.13 default controller).

use std::time::{Duration, Instant};

use super::CongestionController;

const C: f64 = 0.4;
const BETA: f64 = 0.7;
const DEFAULT_MSS: u64 = 1200;
const MIN_CWND_SEGMENTS: f64 = 2.0;

pub struct Cubic {
    mss: u64,
    cwnd: f64,
    ssthresh: f64,
    w_max: f64,
    k: f64,
    epoch_start: Option<Instant>,
    in_slow_start: bool,
    bytes_in_flight: u64,
    last_rtt: Duration,
    last_reduction: Option<Instant>,
}

impl Cubic {
    pub fn new() -> Self {
        Self::with_mss(DEFAULT_MSS)
    }

    pub fn with_mss(mss: u64) -> Self {
        Self {
            mss,
            cwnd: (10 * mss) as f64,
            ssthresh: f64::MAX,
            w_max: 0.0,
            k: 0.0,
            epoch_start: None,
            in_slow_start: true,
            bytes_in_flight: 0,
            last_rtt: Duration::from_millis(100),
            last_reduction: None,
        }
    }

    fn segments(&self) -> f64 {
        self.cwnd / self.mss as f64
    }

    fn reduce(&mut self, now: Instant) {
        self.w_max = self.segments();
        let new_segments = (self.segments() * BETA).max(MIN_CWND_SEGMENTS);
        self.cwnd = new_segments * self.mss as f64;
        self.ssthresh = self.cwnd;
        self.in_slow_start = false;
        self.k = (self.w_max * (1.0 - BETA) / C).cbrt();
        self.epoch_start = Some(now);
        self.last_reduction = Some(now);
    }
}

impl Default for Cubic {
    fn default() -> Self {
        Self::new()
    }
}

impl CongestionController for Cubic {
    fn on_packet_sent(&mut self, bytes: u32, _now: Instant) {
        self.bytes_in_flight += bytes as u64;
    }

    fn on_ack(&mut self, bytes_acked: u32, rtt: Duration, now: Instant) {
        self.bytes_in_flight = self.bytes_in_flight.saturating_sub(bytes_acked as u64);
        self.last_rtt = rtt;

        if self.in_slow_start {
            self.cwnd += bytes_acked as f64;
            if self.cwnd >= self.ssthresh {
                self.in_slow_start = false;
                self.w_max = self.segments();
                self.k = 0.0;
                self.epoch_start = Some(now);
            }
            return;
        }

        let epoch_start = *self.epoch_start.get_or_insert(now);
        let t = now.saturating_duration_since(epoch_start).as_secs_f64();
        let target_segments = C * (t - self.k).powi(3) + self.w_max;
        self.cwnd = target_segments.max(MIN_CWND_SEGMENTS) * self.mss as f64;
    }

    fn on_loss(&mut self, bytes_lost: u32, now: Instant) {
        self.bytes_in_flight = self.bytes_in_flight.saturating_sub(bytes_lost as u64);
        self.reduce(now);
    }

    fn on_ecn_ce(&mut self, now: Instant) {
        let due = self.last_reduction.map_or(true, |last| now.saturating_duration_since(last) >= self.last_rtt);
        if due {
            self.reduce(now);
        }
    }

    fn congestion_window(&self) -> u64 {
        self.cwnd as u64
    }

    fn bytes_in_flight(&self) -> u64 {
        self.bytes_in_flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slow_start_grows_cwnd_on_ack() {
        let mut cubic = Cubic::new();
        let before = cubic.congestion_window();
        let now = Instant::now();
        cubic.on_packet_sent(1200, now);
        cubic.on_ack(1200, Duration::from_millis(50), now);
        assert!(cubic.congestion_window() > before);
    }

    #[test]
    fn loss_multiplicatively_decreases_cwnd() {
        let mut cubic = Cubic::new();
        let now = Instant::now();
        for _ in 0..20 {
            cubic.on_ack(1200, Duration::from_millis(50), now);
        }
        let before = cubic.congestion_window();
        cubic.on_loss(1200, now);
        let after = cubic.congestion_window();
        assert!(after < before);
        assert!((after as f64 - before as f64 * BETA).abs() < before as f64 * 0.05);
    }

    #[test]
    fn congestion_avoidance_recovers_toward_w_max_over_time() {
        let mut cubic = Cubic::new();
        let now = Instant::now();
        for _ in 0..20 {
            cubic.on_ack(1200, Duration::from_millis(50), now);
        }
        cubic.on_loss(1200, now);
        let just_after_loss = cubic.congestion_window();
        let later = now + Duration::from_secs(5);
        cubic.on_ack(1200, Duration::from_millis(50), later);
        assert!(cubic.congestion_window() >= just_after_loss);
    }

    #[test]
    fn ecn_ce_applies_at_most_one_reduction_per_rtt() {
        let mut cubic = Cubic::new();
        let now = Instant::now();
        for _ in 0..20 {
            cubic.on_ack(1200, Duration::from_millis(50), now);
        }
        let before = cubic.congestion_window();
        cubic.on_ecn_ce(now);
        let after_first = cubic.congestion_window();
        cubic.on_ecn_ce(now);
        let after_second = cubic.congestion_window();
        assert!(after_first < before);
        assert_eq!(after_first, after_second);
    }

    #[test]
    fn can_send_respects_window() {
        let mut cubic = Cubic::new();
        let now = Instant::now();
        let window = cubic.congestion_window();
        cubic.on_packet_sent(window as u32, now);
        assert!(!cubic.can_send(1));
    }
}
