//! Loss detection and probe timeout per RFC 9002 (spec §4.14).

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Packets acked out of order beyond this many higher-sequence acks are
/// declared lost (packet-threshold).
const PACKET_THRESHOLD: u64 = 3;
/// Time-threshold multiplier applied to smoothed RTT.
const TIME_THRESHOLD_NUM: u32 = 9;
const TIME_THRESHOLD_DEN: u32 = 8;

struct SentPacket {
    sent_at: Instant,
    size: u32,
}

/// Tracks in-flight frames and declares losses by packet- or time-threshold.
pub struct LossDetector {
    sent: BTreeMap<u64, SentPacket>,
    largest_acked: Option<u64>,
    granularity: Duration,
    pto_backoff: u32,
}

impl LossDetector {
    pub fn new(granularity: Duration) -> Self {
        Self {
            sent: BTreeMap::new(),
            largest_acked: None,
            granularity,
            pto_backoff: 0,
        }
    }

    pub fn on_sent(&mut self, seq: u64, size: u32, now: Instant) {
        self.sent.insert(seq, SentPacket { sent_at: now, size });
    }

    /// Record acked sequence numbers and return the set of sequence numbers
    /// newly declared lost.
    pub fn on_ack(&mut self, acked: &[u64], now: Instant, smoothed_rtt: Duration) -> Vec<u64> {
        for &seq in acked {
            self.sent.remove(&seq);
            self.largest_acked = Some(self.largest_acked.map_or(seq, |l| l.max(seq)));
        }
        if !acked.is_empty() {
            self.pto_backoff = 0;
        }

        let Some(largest_acked) = self.largest_acked else {
            return Vec::new();
        };

        let time_threshold = smoothed_rtt.mul_f64(TIME_THRESHOLD_NUM as f64 / TIME_THRESHOLD_DEN as f64);
        let mut lost = Vec::new();
        for (&seq, pkt) in self.sent.iter() {
            let packet_threshold_met = largest_acked.saturating_sub(seq) >= PACKET_THRESHOLD;
            let time_threshold_met = seq < largest_acked && now.saturating_duration_since(pkt.sent_at) > time_threshold;
            if packet_threshold_met || time_threshold_met {
                lost.push(seq);
            }
        }
        for seq in &lost {
            self.sent.remove(seq);
        }
        lost
    }

    pub fn bytes_in_flight(&self) -> u64 {
        self.sent.values().map(|p| p.size as u64).sum()
    }

    pub fn in_flight_count(&self) -> usize {
        self.sent.len()
    }

    /// Probe timeout, doubling on each successive expiry with no ACKs.
    pub fn pto(&self, smoothed_rtt: Duration, rtt_var: Duration, max_ack_delay: Duration) -> Duration {
        let base = smoothed_rtt + rtt_var.mul_f64(4.0).max(self.granularity) + max_ack_delay;
        base * (1u32 << self.pto_backoff.min(16))
    }

    pub fn on_pto_expired(&mut self) {
        self.pto_backoff = self.pto_backoff.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_threshold_declares_lost_after_three_higher_acks() {
        let mut det = LossDetector::new(Duration::from_millis(1));
        let now = Instant::now();
        for seq in 1..=5 {
            det.on_sent(seq, 100, now);
        }
        let lost = det.on_ack(&[2, 3, 4, 5], now, Duration::from_millis(50));
        assert_eq!(lost, vec![1]);
    }

    #[test]
    fn time_threshold_declares_lost_after_rtt_multiple_elapses() {
        let mut det = LossDetector::new(Duration::from_millis(1));
        let t0 = Instant::now();
        det.on_sent(1, 100, t0);
        det.on_sent(2, 100, t0 + Duration::from_millis(200));
        let later = t0 + Duration::from_millis(300);
        let lost = det.on_ack(&[2], later, Duration::from_millis(50));
        assert_eq!(lost, vec![1]);
    }

    #[test]
    fn unacked_recent_packet_is_not_yet_lost() {
        let mut det = LossDetector::new(Duration::from_millis(1));
        let t0 = Instant::now();
        det.on_sent(1, 100, t0);
        det.on_sent(2, 100, t0);
        let lost = det.on_ack(&[2], t0, Duration::from_millis(50));
        assert!(lost.is_empty());
    }

    #[test]
    fn pto_backs_off_exponentially() {
        let mut det = LossDetector::new(Duration::from_millis(1));
        let srtt = Duration::from_millis(100);
        let var = Duration::from_millis(10);
        let ack_delay = Duration::from_millis(5);
        let first = det.pto(srtt, var, ack_delay);
        det.on_pto_expired();
        let second = det.pto(srtt, var, ack_delay);
        det.on_pto_expired();
        let third = det.pto(srtt, var, ack_delay);
        assert_eq!(second, first * 2);
        assert_eq!(third, first * 4);
    }

    #[test]
    fn bytes_in_flight_tracks_unacked_sizes() {
        let mut det = LossDetector::new(Duration::from_millis(1));
        let now = Instant::now();
        det.on_sent(1, 500, now);
        det.on_sent(2, 300, now);
        assert_eq!(det.bytes_in_flight(), 800);
        det.on_ack(&[1], now, Duration::from_millis(50));
        assert_eq!(det.bytes_in_flight(), 300);
    }
}
