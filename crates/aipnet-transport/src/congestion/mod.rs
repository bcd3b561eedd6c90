//! Pluggable congestion control (spec §4.13).

mod bbr;
mod cubic;

use std::time::{Duration, Instant};

pub use bbr::Bbr;
pub use cubic::Cubic;

/// Plugin contract every congestion controller implements.
pub trait CongestionController: Send {
    fn on_packet_sent(&mut self, bytes: u32, now: Instant);
    fn on_ack(&mut self, bytes_acked: u32, rtt: Duration, now: Instant);
    fn on_loss(&mut self, bytes_lost: u32, now: Instant);
    fn on_ecn_ce(&mut self, now: Instant);
    fn congestion_window(&self) -> u64;
    fn bytes_in_flight(&self) -> u64;
    fn can_send(&self, bytes: u32) -> bool {
        self.bytes_in_flight() + bytes as u64 <= self.congestion_window()
    }
    fn pacing_rate(&self) -> Option<u64> {
        None
    }
}

/// A no-op controller that never limits sending, for delivery modes that
/// opt out of connection-level pacing feedback while still sharing the
/// connection's own congestion window.
#[derive(Debug, Default)]
pub struct Unbounded {
    bytes_in_flight: u64,
}

impl CongestionController for Unbounded {
    fn on_packet_sent(&mut self, bytes: u32, _now: Instant) {
        self.bytes_in_flight += bytes as u64;
    }

    fn on_ack(&mut self, bytes_acked: u32, _rtt: Duration, _now: Instant) {
        self.bytes_in_flight = self.bytes_in_flight.saturating_sub(bytes_acked as u64);
    }

    fn on_loss(&mut self, bytes_lost: u32, _now: Instant) {
        self.bytes_in_flight = self.bytes_in_flight.saturating_sub(bytes_lost as u64);
    }

    fn on_ecn_ce(&mut self, _now: Instant) {}

    fn congestion_window(&self) -> u64 {
        u64::MAX
    }

    fn bytes_in_flight(&self) -> u64 {
        self.bytes_in_flight
    }
}

/// Controller selection, dispatched by hand to avoid an extra proc-macro
/// dependency (mirrors the platform backend enum).
pub enum Controller {
    Cubic(Cubic),
    Bbr(Bbr),
    Unbounded(Unbounded),
}

impl Controller {
    pub fn cubic() -> Self {
        Controller::Cubic(Cubic::new())
    }

    pub fn bbr() -> Self {
        Controller::Bbr(Bbr::new())
    }

    pub fn unbounded() -> Self {
        Controller::Unbounded(Unbounded::default())
    }
}

impl CongestionController for Controller {
    fn on_packet_sent(&mut self, bytes: u32, now: Instant) {
        match self {
            Controller::Cubic(c) => c.on_packet_sent(bytes, now),
            Controller::Bbr(c) => c.on_packet_sent(bytes, now),
            Controller::Unbounded(c) => c.on_packet_sent(bytes, now),
        }
    }

    fn on_ack(&mut self, bytes_acked: u32, rtt: Duration, now: Instant) {
        match self {
            Controller::Cubic(c) => c.on_ack(bytes_acked, rtt, now),
            Controller::Bbr(c) => c.on_ack(bytes_acked, rtt, now),
            Controller::Unbounded(c) => c.on_ack(bytes_acked, rtt, now),
        }
    }

    fn on_loss(&mut self, bytes_lost: u32, now: Instant) {
        match self {
            Controller::Cubic(c) => c.on_loss(bytes_lost, now),
            Controller::Bbr(c) => c.on_loss(bytes_lost, now),
            Controller::Unbounded(c) => c.on_loss(bytes_lost, now),
        }
    }

    fn on_ecn_ce(&mut self, now: Instant) {
        match self {
            Controller::Cubic(c) => c.on_ecn_ce(now),
            Controller::Bbr(c) => c.on_ecn_ce(now),
            Controller::Unbounded(c) => c.on_ecn_ce(now),
        }
    }

    fn congestion_window(&self) -> u64 {
        match self {
            Controller::Cubic(c) => c.congestion_window(),
            Controller::Bbr(c) => c.congestion_window(),
            Controller::Unbounded(c) => c.congestion_window(),
        }
    }

    fn bytes_in_flight(&self) -> u64 {
        match self {
            Controller::Cubic(c) => c.bytes_in_flight(),
            Controller::Bbr(c) => c.bytes_in_flight(),
            Controller::Unbounded(c) => c.bytes_in_flight(),
        }
    }

    fn pacing_rate(&self) -> Option<u64> {
        match self {
            Controller::Cubic(c) => c.pacing_rate(),
            Controller::Bbr(c) => c.pacing_rate(),
            Controller::Unbounded(c) => c.pacing_rate(),
        }
    }
}
