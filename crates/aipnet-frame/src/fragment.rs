//! Fragmentation and reassembly for payloads exceeding the path MTU (spec §4.1).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::error::FrameError;
use crate::header::{FrameFlags, FrameHeader, NodeId};
use crate::options::{OptionType, OwnedOption};

/// Default reassembly timeout before an incomplete fragment group is evicted.
pub const DEFAULT_REASSEMBLY_TIMEOUT: Duration = Duration::from_secs(2);

/// Split `payload` into frames of at most `budget` payload bytes each,
/// sharing `header`'s stream id and a base sequence. All but the last frame
/// carry `MORE_FRAGMENTS`; every frame carries a `FRAGMENT_INFO` option of
/// `(fragment_offset: u32, total_fragments: u32)`.
pub fn fragment(header: &FrameHeader, payload: &[u8], budget: usize) -> Vec<(FrameHeader, OwnedOption, Vec<u8>)> {
    assert!(budget > 0, "fragment budget must be non-zero");
    if payload.len() <= budget {
        return vec![(
            header.clone(),
            fragment_info_option(0, 1),
            payload.to_vec(),
        )];
    }

    let chunks: Vec<&[u8]> = payload.chunks(budget).collect();
    let total = chunks.len() as u32;
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            let mut h = header.clone();
            h.sequence = header.sequence.wrapping_add(i as u32);
            if (i as u32) + 1 < total {
                h.flags.insert(FrameFlags::MORE_FRAGMENTS);
            } else {
                h.flags.remove(FrameFlags::MORE_FRAGMENTS);
            }
            (h, fragment_info_option(i as u32, total), chunk.to_vec())
        })
        .collect()
}

fn fragment_info_option(offset: u32, total: u32) -> OwnedOption {
    let mut value = Vec::with_capacity(8);
    value.extend_from_slice(&offset.to_be_bytes());
    value.extend_from_slice(&total.to_be_bytes());
    OwnedOption {
        ty: OptionType::FragmentInfo,
        value,
    }
}

/// Parses a `FRAGMENT_INFO` option value into `(offset, total)`.
pub fn parse_fragment_info(value: &[u8]) -> Option<(u32, u32)> {
    if value.len() != 8 {
        return None;
    }
    let offset = u32::from_be_bytes(value[0..4].try_into().unwrap());
    let total = u32::from_be_bytes(value[4..8].try_into().unwrap());
    Some((offset, total))
}

#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy)]
struct GroupKey {
    src: NodeId,
    stream_id: u32,
    base_seq: u32,
}

struct Group {
    total: u32,
    fragments: HashMap<u32, Vec<u8>>,
    first_seen: Instant,
}

/// Accumulates fragments keyed by `(src_node_id, stream_id, base_seq)` and
/// reassembles complete groups, evicting groups older than `timeout`.
pub struct Reassembler {
    groups: HashMap<GroupKey, Group>,
    timeout: Duration,
}

impl Reassembler {
    pub fn new(timeout: Duration) -> Self {
        Self {
            groups: HashMap::new(),
            timeout,
        }
    }

    /// Feed one fragment, identified by its base sequence (the sequence of
    /// fragment 0 in the group: `header.sequence - offset`). Returns the
    /// reassembled payload once every fragment has arrived.
    pub fn accept(
        &mut self,
        header: &FrameHeader,
        fragment_info: (u32, u32),
        data: &[u8],
        now: Instant,
    ) -> Result<Option<Vec<u8>>, FrameError> {
        self.evict_expired(now);

        let (offset, total) = fragment_info;
        let base_seq = header.sequence.wrapping_sub(offset);
        let key = GroupKey {
            src: header.src_node_id,
            stream_id: header.stream_id,
            base_seq,
        };

        let group = self.groups.entry(key).or_insert_with(|| Group {
            total,
            fragments: HashMap::new(),
            first_seen: now,
        });
        group.fragments.insert(offset, data.to_vec());

        if group.fragments.len() as u32 == group.total {
            let group = self.groups.remove(&key).unwrap();
            let mut out = Vec::new();
            for i in 0..group.total {
                match group.fragments.get(&i) {
                    Some(chunk) => out.extend_from_slice(chunk),
                    None => unreachable!("complete group missing a fragment index"),
                }
            }
            return Ok(Some(out));
        }
        Ok(None)
    }

    /// Evict groups older than `timeout`, returning how many were dropped.
    pub fn evict_expired(&mut self, now: Instant) -> usize {
        let timeout = self.timeout;
        let before = self.groups.len();
        self.groups
            .retain(|_, group| now.duration_since(group.first_seen) < timeout);
        before - self.groups.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{FrameType, QosClass};

    fn base_header() -> FrameHeader {
        FrameHeader {
            version: 1,
            flags: FrameFlags::empty(),
            frame_type: FrameType::Data,
            total_frame_length: 0,
            stream_id: 7,
            sequence: 0,
            src_node_id: NodeId([9; 16]),
            dst_node_id: NodeId([8; 16]),
            priority: 0,
            qos_class: QosClass::ReliableOrdered,
            tensor_dtype: 0,
            tensor_alignment: 0,
            options_length: 0,
            timestamp_ns: 0,
        }
    }

    #[test]
    fn fragments_reassemble_to_original_payload() {
        let header = base_header();
        let payload = vec![7u8; 25];
        let frames = fragment(&header, &payload, 10);
        assert_eq!(frames.len(), 3);
        assert!(frames[0].0.flags.contains(FrameFlags::MORE_FRAGMENTS));
        assert!(!frames[2].0.flags.contains(FrameFlags::MORE_FRAGMENTS));

        let mut reasm = Reassembler::new(DEFAULT_REASSEMBLY_TIMEOUT);
        let now = Instant::now();
        let mut result = None;
        for (h, opt, data) in &frames {
            let info = parse_fragment_info(&opt.value).unwrap();
            result = reasm.accept(h, info, data, now).unwrap();
        }
        assert_eq!(result.unwrap(), payload);
    }

    #[test]
    fn incomplete_group_evicted_after_timeout() {
        let header = base_header();
        let payload = vec![1u8; 25];
        let frames = fragment(&header, &payload, 10);

        let mut reasm = Reassembler::new(Duration::from_millis(1));
        let t0 = Instant::now();
        let (h, opt, data) = &frames[0];
        let info = parse_fragment_info(&opt.value).unwrap();
        reasm.accept(h, info, data, t0).unwrap();
        assert_eq!(reasm.groups.len(), 1);

        let later = t0 + Duration::from_millis(5);
        let evicted = reasm.evict_expired(later);
        assert_eq!(evicted, 1);
        assert!(reasm.groups.is_empty());
    }
}
