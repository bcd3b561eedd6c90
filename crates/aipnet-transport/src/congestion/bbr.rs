//! BBR congestion control sketch, RFC 9438 (spec §4.13 optional controller).
//!
//! Estimates bottleneck bandwidth over a 10-round window and min RTT over a
//! 10-second window, then sizes the window at `2 * BtlBw * RTprop` while
//! cycling pacing gain through probe/drain/cruise phases.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use super::CongestionController;

const BW_WINDOW_ROUNDS: usize = 10;
const RTPROP_WINDOW: Duration = Duration::from_secs(10);
const STARTUP_GAIN: f64 = 2.77;
const DRAIN_GAIN: f64 = 1.0 / STARTUP_GAIN;
const PROBE_BW_GAINS: [f64; 8] = [1.25, 0.75, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0];
const STARTUP_ROUNDS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Startup,
    Drain,
    ProbeBw(usize),
}

pub struct Bbr {
    bw_samples: VecDeque<f64>,
    btlbw: f64,
    rtprop: Duration,
    rtprop_recorded_at: Instant,
    phase: Phase,
    round: usize,
    bytes_in_flight: u64,
    initialized: bool,
}

impl Bbr {
    pub fn new() -> Self {
        Self {
            bw_samples: VecDeque::with_capacity(BW_WINDOW_ROUNDS),
            btlbw: 0.0,
            rtprop: Duration::MAX,
            rtprop_recorded_at: Instant::now(),
            phase: Phase::Startup,
            round: 0,
            bytes_in_flight: 0,
            initialized: false,
        }
    }

    fn gain(&self) -> f64 {
        match self.phase {
            Phase::Startup => STARTUP_GAIN,
            Phase::Drain => DRAIN_GAIN,
            Phase::ProbeBw(i) => PROBE_BW_GAINS[i % PROBE_BW_GAINS.len()],
        }
    }

    fn advance_phase(&mut self) {
        self.round += 1;
        match self.phase {
            Phase::Startup => {
                if self.round >= STARTUP_ROUNDS {
                    self.phase = Phase::Drain;
                }
            }
            Phase::Drain => {
                self.phase = Phase::ProbeBw(0);
            }
            Phase::ProbeBw(i) => {
                self.phase = Phase::ProbeBw((i + 1) % PROBE_BW_GAINS.len());
            }
        }
    }

    fn rtprop(&self, now: Instant) -> Duration {
        if self.rtprop == Duration::MAX || now.saturating_duration_since(self.rtprop_recorded_at) > RTPROP_WINDOW {
            Duration::ZERO
        } else {
            self.rtprop
        }
    }
}

impl Default for Bbr {
    fn default() -> Self {
        Self::new()
    }
}

impl CongestionController for Bbr {
    fn on_packet_sent(&mut self, bytes: u32, _now: Instant) {
        self.bytes_in_flight += bytes as u64;
    }

    fn on_ack(&mut self, bytes_acked: u32, rtt: Duration, now: Instant) {
        self.bytes_in_flight = self.bytes_in_flight.saturating_sub(bytes_acked as u64);
        self.initialized = true;

        if rtt > Duration::ZERO {
            let delivery_rate = bytes_acked as f64 / rtt.as_secs_f64();
            self.bw_samples.push_back(delivery_rate);
            if self.bw_samples.len() > BW_WINDOW_ROUNDS {
                self.bw_samples.pop_front();
            }
            self.btlbw = self.bw_samples.iter().cloned().fold(0.0, f64::max);

            if rtt < self.rtprop || now.saturating_duration_since(self.rtprop_recorded_at) > RTPROP_WINDOW {
                self.rtprop = rtt;
                self.rtprop_recorded_at = now;
            }
        }

        self.advance_phase();
    }

    fn on_loss(&mut self, bytes_lost: u32, _now: Instant) {
        self.bytes_in_flight = self.bytes_in_flight.saturating_sub(bytes_lost as u64);
    }

    fn on_ecn_ce(&mut self, _now: Instant) {}

    fn congestion_window(&self) -> u64 {
        if !self.initialized {
            return u64::MAX;
        }
        let rtprop = self.rtprop(Instant::now());
        (2.0 * self.btlbw * rtprop.as_secs_f64()) as u64
    }

    fn bytes_in_flight(&self) -> u64 {
        self.bytes_in_flight
    }

    fn pacing_rate(&self) -> Option<u64> {
        if !self.initialized {
            return None;
        }
        Some((self.btlbw * self.gain()) as u64)
    }
}
