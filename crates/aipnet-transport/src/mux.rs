//! Multiplexer (spec §4.12): inbound dispatch by frame type and stream id,
//! outbound scheduling by priority with deficit round-robin and
//! congestion-window-gated admission.

use std::collections::{HashMap, VecDeque};

use aipnet_frame::header::{FrameType, NodeId};

use crate::stream::StreamId;

pub const NUM_PRIORITIES: usize = 16;
pub const DEFAULT_QUANTUM: u32 = 1500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundDisposition {
    ToConnection,
    ToStream(StreamId),
    UnknownStream(StreamId),
}

/// Route an inbound frame by its header fields (spec §4.12). `known_streams`
/// is the set of stream ids currently live on this connection.
pub fn route_inbound(frame_type: FrameType, stream_id: u32, known_streams: &impl Fn(StreamId) -> bool) -> InboundDisposition {
    match frame_type {
        FrameType::StreamControl | FrameType::Control => InboundDisposition::ToConnection,
        FrameType::Data | FrameType::TensorTransfer => {
            let sid = StreamId(stream_id);
            if known_streams(sid) {
                InboundDisposition::ToStream(sid)
            } else {
                InboundDisposition::UnknownStream(sid)
            }
        }
        FrameType::Heartbeat | FrameType::RouteAdvertisement | FrameType::TrustHandshake => {
            InboundDisposition::ToConnection
        }
    }
}

#[derive(Debug, Default)]
pub struct InboundStats {
    pub dropped_unknown_stream: u64,
}

#[derive(Debug, Clone)]
pub struct OutboundFrame {
    pub stream_id: StreamId,
    pub priority: u8,
    pub dst: NodeId,
    pub bytes: Vec<u8>,
}

struct Lane {
    queue: VecDeque<OutboundFrame>,
    deficit: u32,
}

impl Lane {
    fn new() -> Self {
        Self { queue: VecDeque::new(), deficit: 0 }
    }
}

/// Priority + deficit-round-robin outbound scheduler, gated by a
/// congestion-window budget supplied per [`Scheduler::drain`] call.
pub struct Scheduler {
    lanes: HashMap<u8, Lane>,
    quantum: u32,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::with_quantum(DEFAULT_QUANTUM)
    }

    pub fn with_quantum(quantum: u32) -> Self {
        Self { lanes: HashMap::new(), quantum }
    }

    pub fn enqueue(&mut self, frame: OutboundFrame) {
        assert!(frame.priority < NUM_PRIORITIES as u8);
        self.lanes.entry(frame.priority).or_insert_with(Lane::new).queue.push_back(frame);
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.values().all(|l| l.queue.is_empty())
    }

    fn priorities_highest_first(&self) -> Vec<u8> {
        let mut ps: Vec<u8> = self.lanes.iter().filter(|(_, l)| !l.queue.is_empty()).map(|(&p, _)| p).collect();
        ps.sort_unstable_by(|a, b| b.cmp(a));
        ps
    }

    /// Drain frames admissible under `budget` bytes (the congestion window
    /// minus bytes already in flight), highest priority first, applying
    /// deficit round-robin within each priority class.
    pub fn drain(&mut self, mut budget: u64) -> Vec<OutboundFrame> {
        let mut out = Vec::new();
        for priority in self.priorities_highest_first() {
            let lane = self.lanes.get_mut(&priority).unwrap();
            lane.deficit += self.quantum;
            while let Some(front) = lane.queue.front() {
                let cost = front.bytes.len() as u32;
                if budget < cost as u64 || lane.deficit < cost {
                    break;
                }
                let frame = lane.queue.pop_front().unwrap();
                lane.deficit -= cost;
                budget -= cost as u64;
                out.push(frame);
            }
            lane.deficit = 0;
        }
        out
    }

    pub fn queued_len(&self, priority: u8) -> usize {
        self.lanes.get(&priority).map(|l| l.queue.len()).unwrap_or(0)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(priority: u8, size: usize) -> OutboundFrame {
        OutboundFrame { stream_id: StreamId(1), priority, dst: NodeId::ZERO, bytes: vec![0u8; size] }
    }

    #[test]
    fn control_and_stream_control_frames_route_to_the_connection() {
        let known = |_: StreamId| false;
        assert_eq!(route_inbound(FrameType::StreamControl, 4, &known), InboundDisposition::ToConnection);
        assert_eq!(route_inbound(FrameType::Control, 0, &known), InboundDisposition::ToConnection);
    }

    #[test]
    fn data_frame_for_known_stream_routes_there() {
        let known = |id: StreamId| id == StreamId(7);
        assert_eq!(route_inbound(FrameType::Data, 7, &known), InboundDisposition::ToStream(StreamId(7)));
    }

    #[test]
    fn data_frame_for_unknown_stream_is_flagged() {
        let known = |_: StreamId| false;
        assert_eq!(route_inbound(FrameType::Data, 99, &known), InboundDisposition::UnknownStream(StreamId(99)));
    }

    #[test]
    fn higher_priority_lane_drains_before_lower() {
        let mut sched = Scheduler::new();
        sched.enqueue(frame(1, 100));
        sched.enqueue(frame(15, 100));
        let drained = sched.drain(1_000_000);
        assert_eq!(drained[0].priority, 15);
        assert_eq!(drained[1].priority, 1);
    }

    #[test]
    fn congestion_budget_caps_how_much_drains() {
        let mut sched = Scheduler::new();
        sched.enqueue(frame(5, 900));
        sched.enqueue(frame(5, 900));
        let drained = sched.drain(1000);
        assert_eq!(drained.len(), 1);
        assert!(!sched.is_empty());
    }

    #[test]
    fn deficit_round_robin_bounds_one_lane_per_round() {
        let mut sched = Scheduler::with_quantum(100);
        for _ in 0..5 {
            sched.enqueue(frame(3, 60));
        }
        let drained = sched.drain(10_000);
        assert_eq!(drained.len(), 1);
    }
}
