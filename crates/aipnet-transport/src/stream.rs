//! Stream state machine and the four delivery modes (spec §4.11).

use std::collections::{BTreeMap, HashSet};

use rand::Rng;

/// Stream identifier. Per convention, client-opened streams are odd, and
/// server-opened streams are even (an even/odd split avoids a 3-way
/// handshake to agree on the next free id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamId(pub u32);

impl StreamId {
    pub fn first_client() -> Self {
        StreamId(1)
    }

    pub fn first_server() -> Self {
        StreamId(0)
    }

    pub fn is_client_initiated(&self) -> bool {
        self.0 % 2 == 1
    }

    pub fn next(&self) -> Self {
        StreamId(self.0 + 2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Opening,
    Open,
    HalfClosedLocal,
    HalfClosedRemote,
    Closed,
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEvent {
    Open,
    AckOpen,
    CloseLocal,
    CloseRemote,
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub state: StreamState,
    pub event: StreamEvent,
}

impl std::fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "event {:?} is invalid in state {:?}", self.event, self.state)
    }
}

impl std::error::Error for InvalidTransition {}

/// Drive one state transition (spec §4.11 `STREAM_OPEN`/`STREAM_ACK`/`STREAM_CLOSE`/`STREAM_RESET`).
pub fn transition(state: StreamState, event: StreamEvent) -> Result<StreamState, InvalidTransition> {
    use StreamEvent as E;
    use StreamState as S;
    let next = match (state, event) {
        (S::Idle, E::Open) => S::Opening,
        (S::Opening, E::AckOpen) => S::Open,
        (S::Open, E::CloseLocal) => S::HalfClosedLocal,
        (S::Open, E::CloseRemote) => S::HalfClosedRemote,
        (S::HalfClosedLocal, E::CloseRemote) => S::Closed,
        (S::HalfClosedRemote, E::CloseLocal) => S::Closed,
        (_, E::Reset) if state != S::Closed && state != S::Reset => S::Reset,
        _ => return Err(InvalidTransition { state, event }),
    };
    Ok(next)
}

/// Forward-error-correction scheme for probabilistic delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fec {
    None,
    Xor { redundancy: u32 },
}

const MAX_RETRANSMITS: u32 = 10;
const DEFAULT_CHUNK_SIZE: usize = 1200;

#[derive(Debug)]
pub struct RetransmitLimitExceeded;

impl std::fmt::Display for RetransmitLimitExceeded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "retransmission attempts exceeded the cap of {MAX_RETRANSMITS}")
    }
}

impl std::error::Error for RetransmitLimitExceeded {}

struct Unacked {
    data: Vec<u8>,
    retransmits: u32,
}

/// Shared reliability core for Reliable-Ordered and Reliable-Unordered
/// streams: sequence-numbered sends, selective ack/nack tracking, and a
/// retransmission cap. Ordering is the only behavioral difference, applied
/// at delivery time by [`ReliableStream::ordered`].
pub struct ReliableStream {
    ordered: bool,
    next_send_seq: u64,
    unacked: BTreeMap<u64, Unacked>,
    recv_next_in_order: u64,
    reorder_buffer: BTreeMap<u64, Vec<u8>>,
    seen_unordered: HashSet<u64>,
    window_bytes: u32,
}

impl ReliableStream {
    pub fn ordered(window_bytes: u32) -> Self {
        Self::new(true, window_bytes)
    }

    pub fn unordered(window_bytes: u32) -> Self {
        Self::new(false, window_bytes)
    }

    fn new(ordered: bool, window_bytes: u32) -> Self {
        Self {
            ordered,
            next_send_seq: 0,
            unacked: BTreeMap::new(),
            recv_next_in_order: 0,
            reorder_buffer: BTreeMap::new(),
            seen_unordered: HashSet::new(),
            window_bytes,
        }
    }

    pub fn window_bytes(&self) -> u32 {
        self.window_bytes
    }

    pub fn set_window(&mut self, bytes: u32) {
        self.window_bytes = bytes;
    }

    /// Queue `data` for send, chunking by [`DEFAULT_CHUNK_SIZE`] when
    /// ordered (byte-stream semantics); one whole message per call when
    /// unordered. Returns the `(seq, chunk)` pairs ready to transmit.
    pub fn queue_send(&mut self, data: &[u8]) -> Vec<(u64, Vec<u8>)> {
        let chunks: Vec<Vec<u8>> = if self.ordered {
            data.chunks(DEFAULT_CHUNK_SIZE).map(|c| c.to_vec()).collect()
        } else {
            vec![data.to_vec()]
        };

        let mut out = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let seq = self.next_send_seq;
            self.next_send_seq += 1;
            self.unacked.insert(seq, Unacked { data: chunk.clone(), retransmits: 0 });
            out.push((seq, chunk));
        }
        out
    }

    /// Apply a cumulative ack plus disjoint received ranges (spec §4.11 SACK).
    pub fn on_sack(&mut self, cumulative_ack: u64, ranges: &[(u64, u64)]) {
        self.unacked.retain(|&seq, _| seq >= cumulative_ack);
        for &(start, end) in ranges {
            for seq in start..=end {
                self.unacked.remove(&seq);
            }
        }
    }

    /// Chunks below `cumulative_ack` still unacked are assumed lost and due
    /// for retransmission; bumps their retry counter and returns their
    /// bytes, or an error once any one of them exceeds the retry cap.
    pub fn retransmit_candidates(&mut self, cumulative_ack: u64) -> Result<Vec<(u64, Vec<u8>)>, RetransmitLimitExceeded> {
        let mut out = Vec::new();
        for (&seq, entry) in self.unacked.iter_mut() {
            if seq >= cumulative_ack {
                continue;
            }
            entry.retransmits += 1;
            if entry.retransmits > MAX_RETRANSMITS {
                return Err(RetransmitLimitExceeded);
            }
            out.push((seq, entry.data.clone()));
        }
        Ok(out)
    }

    /// Accept an inbound chunk/message. Returns data ready for the
    /// application: for ordered streams, only the contiguous in-order run
    /// starting at the current gap; for unordered, the message itself
    /// (deduplicated), surfaced immediately in arrival order.
    pub fn on_data(&mut self, seq: u64, data: Vec<u8>) -> Vec<Vec<u8>> {
        if !self.ordered {
            return if self.seen_unordered.insert(seq) { vec![data] } else { Vec::new() };
        }

        if seq < self.recv_next_in_order {
            return Vec::new();
        }
        if seq == self.recv_next_in_order {
            let mut ready = vec![data];
            self.recv_next_in_order += 1;
            while let Some(next) = self.reorder_buffer.remove(&self.recv_next_in_order) {
                ready.push(next);
                self.recv_next_in_order += 1;
            }
            ready
        } else {
            self.reorder_buffer.insert(seq, data);
            Vec::new()
        }
    }
}

/// Best-effort stream: no ACKs, no retransmission, no per-stream flow
/// control (connection-level congestion control still governs admission).
#[derive(Debug, Default)]
pub struct BestEffortStream {
    pub next_seq_hint: u64,
}

impl BestEffortStream {
    pub fn send(&mut self, data: Vec<u8>) -> (u64, Vec<u8>) {
        let seq = self.next_seq_hint;
        self.next_seq_hint += 1;
        (seq, data)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProbabilisticReport {
    pub received: u64,
    pub lost: u64,
}

/// Probabilistic stream: each frame is independently delivered with target
/// probability `p`, with optional XOR forward-error-correction.
pub struct ProbabilisticStream {
    p: f64,
    fec: Fec,
    report: ProbabilisticReport,
}

impl ProbabilisticStream {
    pub fn new(p: f64, fec: Fec) -> Self {
        Self { p: p.clamp(0.0, 1.0), fec, report: ProbabilisticReport::default() }
    }

    /// Simulate the independent per-frame delivery decision.
    pub fn roll_delivered(&self, rng: &mut impl Rng) -> bool {
        rng.gen_bool(self.p)
    }

    pub fn record(&mut self, delivered: bool) {
        if delivered {
            self.report.received += 1;
        } else {
            self.report.lost += 1;
        }
    }

    pub fn report(&self) -> ProbabilisticReport {
        self.report
    }

    /// XOR parity across a redundancy group, when `fec` is [`Fec::Xor`].
    pub fn xor_parity(&self, frames: &[Vec<u8>]) -> Option<Vec<u8>> {
        let Fec::Xor { .. } = self.fec else { return None };
        let max_len = frames.iter().map(|f| f.len()).max()?;
        let mut parity = vec![0u8; max_len];
        for frame in frames {
            for (i, &byte) in frame.iter().enumerate() {
                parity[i] ^= byte;
            }
        }
        Some(parity)
    }

    /// Recover a single missing frame from its group's surviving frames plus parity.
    pub fn xor_recover(&self, surviving: &[Vec<u8>], parity: &[u8]) -> Vec<u8> {
        let mut recovered = parity.to_vec();
        for frame in surviving {
            for (i, &byte) in frame.iter().enumerate() {
                recovered[i] ^= byte;
            }
        }
        recovered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    #[test]
    fn stream_id_parity_matches_initiator() {
        assert!(StreamId::first_client().is_client_initiated());
        assert!(!StreamId::first_server().is_client_initiated());
        assert_eq!(StreamId::first_client().next(), StreamId(3));
    }

    #[test]
    fn valid_fsm_path_opens_and_closes_cleanly() {
        let s = transition(StreamState::Idle, StreamEvent::Open).unwrap();
        let s = transition(s, StreamEvent::AckOpen).unwrap();
        assert_eq!(s, StreamState::Open);
        let s = transition(s, StreamEvent::CloseLocal).unwrap();
        let s = transition(s, StreamEvent::CloseRemote).unwrap();
        assert_eq!(s, StreamState::Closed);
    }

    #[test]
    fn reset_is_reachable_from_any_live_state() {
        let s = transition(StreamState::Open, StreamEvent::Reset).unwrap();
        assert_eq!(s, StreamState::Reset);
    }

    #[test]
    fn invalid_transition_is_rejected() {
        assert!(transition(StreamState::Idle, StreamEvent::CloseLocal).is_err());
    }

    #[test]
    fn ordered_stream_buffers_out_of_order_until_gap_closes() {
        let mut s = ReliableStream::ordered(65536);
        assert!(s.on_data(1, b"b".to_vec()).is_empty());
        let delivered = s.on_data(0, b"a".to_vec());
        assert_eq!(delivered, vec![b"a".to_vec(), b"b".to_vec()]);
    }

    #[test]
    fn unordered_stream_delivers_in_arrival_order() {
        let mut s = ReliableStream::unordered(65536);
        let first = s.on_data(5, b"late".to_vec());
        let second = s.on_data(1, b"early".to_vec());
        assert_eq!(first, vec![b"late".to_vec()]);
        assert_eq!(second, vec![b"early".to_vec()]);
    }

    #[test]
    fn sack_clears_acked_chunks_from_retransmit_tracking() {
        let mut s = ReliableStream::ordered(65536);
        s.queue_send(b"hello world");
        s.on_sack(1, &[]);
        let candidates = s.retransmit_candidates(1).unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn retransmission_cap_is_enforced() {
        let mut s = ReliableStream::ordered(65536);
        s.queue_send(b"x");
        for _ in 0..10 {
            s.retransmit_candidates(1).unwrap();
        }
        assert!(s.retransmit_candidates(1).is_err());
    }

    #[test]
    fn probabilistic_stream_reports_split_of_received_and_lost() {
        let mut s = ProbabilisticStream::new(0.5, Fec::None);
        let mut rng = StepRng::new(0, u64::MAX / 2);
        for _ in 0..10 {
            let delivered = s.roll_delivered(&mut rng);
            s.record(delivered);
        }
        let report = s.report();
        assert_eq!(report.received + report.lost, 10);
    }

    #[test]
    fn xor_parity_recovers_a_missing_frame() {
        let s = ProbabilisticStream::new(1.0, Fec::Xor { redundancy: 1 });
        let frames = vec![vec![0b1010_1010], vec![0b0101_0101]];
        let parity = s.xor_parity(&frames).unwrap();
        let recovered = s.xor_recover(&[frames[0].clone()], &parity);
        assert_eq!(recovered, frames[1]);
    }
}
