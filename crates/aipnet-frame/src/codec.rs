//! Frame codec: header + TLV options + payload + CRC-32C trailer.

use crate::crc::crc32c;
use crate::error::FrameError;
use crate::header::{CRC_LEN, FrameHeader, HEADER_LEN, MAX_OPTIONS_LEN};
use crate::options::{self, Option_, OwnedOption};

/// A decoded frame: header plus borrowed views into the source buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame<'a> {
    pub header: FrameHeader,
    pub options: Vec<Option_<'a>>,
    pub payload: &'a [u8],
}

/// Encode a frame into `out`, returning the number of bytes written.
///
/// `header.total_frame_length` and `header.options_length` are overwritten
/// to match the actual encoded sizes, matching the invariant
/// `total_frame_length == 64 + options_length + payload_length + 4`.
pub fn encode(
    mut header: FrameHeader,
    options: &[OwnedOption],
    payload: &[u8],
    out: &mut Vec<u8>,
) -> Result<usize, FrameError> {
    let mut options_bytes = Vec::new();
    options::encode_options(options, &mut options_bytes)?;
    if options_bytes.len() > MAX_OPTIONS_LEN {
        return Err(FrameError::OptionTooLong(options_bytes.len() as u16));
    }

    header.options_length = options_bytes.len() as u16;
    header.total_frame_length =
        (HEADER_LEN + options_bytes.len() + payload.len() + CRC_LEN) as u32;

    out.clear();
    out.reserve(header.total_frame_length as usize);

    let mut header_bytes = [0u8; HEADER_LEN];
    header.encode(&mut header_bytes);
    out.extend_from_slice(&header_bytes);
    out.extend_from_slice(&options_bytes);
    out.extend_from_slice(payload);

    let crc = crc32c(out);
    out.extend_from_slice(&crc.to_le_bytes());

    Ok(out.len())
}

/// Decode a frame from `buf`, validating length consistency and the CRC-32C
/// trailer. Never panics or reads out of bounds, even on adversarial input
/// (spec §8 invariant 3).
pub fn decode(buf: &[u8]) -> Result<DecodedFrame<'_>, FrameError> {
    if buf.len() < HEADER_LEN + CRC_LEN {
        return Err(FrameError::BufferTooShort {
            need: HEADER_LEN + CRC_LEN,
            have: buf.len(),
        });
    }

    let mut header_bytes = [0u8; HEADER_LEN];
    header_bytes.copy_from_slice(&buf[..HEADER_LEN]);
    let header = FrameHeader::decode(&header_bytes)?;

    if header.total_frame_length as usize != buf.len() {
        return Err(FrameError::LengthMismatch {
            expected: header.total_frame_length,
            actual: buf.len() as u32,
        });
    }

    let options_len = header.options_length as usize;
    if HEADER_LEN + options_len + CRC_LEN > buf.len() {
        return Err(FrameError::BufferTooShort {
            need: HEADER_LEN + options_len + CRC_LEN,
            have: buf.len(),
        });
    }

    let options_region = &buf[HEADER_LEN..HEADER_LEN + options_len];
    let options = options::decode_options(options_region)?;

    let payload_start = HEADER_LEN + options_len;
    let payload_end = buf.len() - CRC_LEN;
    let payload = &buf[payload_start..payload_end];

    let expected_crc = u32::from_le_bytes(buf[payload_end..].try_into().unwrap());
    let actual_crc = crc32c(&buf[..payload_end]);
    if expected_crc != actual_crc {
        return Err(FrameError::BadCrc {
            expected: expected_crc,
            actual: actual_crc,
        });
    }

    Ok(DecodedFrame {
        header,
        options,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{FrameFlags, FrameType, NodeId, QosClass};
    use crate::options::OptionType;

    fn sample_header() -> FrameHeader {
        FrameHeader {
            version: 1,
            flags: FrameFlags::empty(),
            frame_type: FrameType::Data,
            total_frame_length: 0,
            stream_id: 100,
            sequence: 1,
            src_node_id: NodeId([1; 16]),
            dst_node_id: NodeId([2; 16]),
            priority: 5,
            qos_class: QosClass::ReliableOrdered,
            tensor_dtype: 0,
            tensor_alignment: 0,
            options_length: 0,
            timestamp_ns: 123,
        }
    }

    #[test]
    fn frame_round_trip() {
        let options = vec![OwnedOption {
            ty: OptionType::TraceId,
            value: vec![0xAA; 16],
        }];
        let mut buf = Vec::new();
        let n = encode(sample_header(), &options, b"Hello", &mut buf).unwrap();
        assert_eq!(n, buf.len());

        let expected_crc = crc32c(&buf[..buf.len() - 4]);
        let trailer = u32::from_le_bytes(buf[buf.len() - 4..].try_into().unwrap());
        assert_eq!(trailer, expected_crc);

        let decoded = decode(&buf).unwrap();
        assert_eq!(decoded.payload, b"Hello");
        assert_eq!(decoded.options.len(), 1);
        assert_eq!(decoded.options[0].ty, OptionType::TraceId);
        assert_eq!(decoded.header.stream_id, 100);
        assert_eq!(decoded.header.sequence, 1);
    }

    #[test]
    fn decode_rejects_truncated_buffer_without_panicking() {
        for len in 0..70 {
            let buf = vec![0u8; len];
            let _ = decode(&buf);
        }
    }

    #[test]
    fn decode_rejects_bad_crc() {
        let mut buf = Vec::new();
        encode(sample_header(), &[], b"data", &mut buf).unwrap();
        let last = buf.len() - 1;
        buf[last] ^= 0xFF;
        assert!(matches!(decode(&buf), Err(FrameError::BadCrc { .. })));
    }

    #[test]
    fn decode_rejects_length_mismatch() {
        let mut buf = Vec::new();
        encode(sample_header(), &[], b"data", &mut buf).unwrap();
        buf.push(0); // trailing garbage byte changes buf.len() vs total_frame_length
        assert!(matches!(decode(&buf), Err(FrameError::LengthMismatch { .. })));
    }

    #[test]
    fn decode_never_panics_on_random_bytes() {
        // Deterministic pseudo-random sweep, no external RNG dependency needed.
        let mut seed = 0x1234_5678u32;
        for _ in 0..2000 {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let len = (seed % 140) as usize;
            let mut buf = vec![0u8; len];
            for b in buf.iter_mut() {
                seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                *b = (seed >> 24) as u8;
            }
            let _ = decode(&buf);
        }
    }
}
