//! TLV option encoding (spec §3 "TLV option", §4.1).
//!
//! Each option is `type(1) length(1) value(length)`. The top bit of `type`
//! marks the option critical: an unrecognized critical option fails
//! decoding, while an unrecognized non-critical option is skipped.

use crate::error::FrameError;

const CRITICAL_BIT: u8 = 0x80;

/// Well-known TLV option types. `FRAGMENT_INFO` and `SEMANTIC_ADDRESS` are
/// marked critical (top bit set) because silently skipping either corrupts
/// reassembly or routing; the rest are safe to skip when unrecognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionType {
    FragmentInfo,
    CompressionAlg,
    EncryptionTag,
    TensorShape,
    TraceId,
    HopCount,
    SemanticAddress,
    GpuHint,
    Unknown(u8),
}

impl OptionType {
    const FRAGMENT_INFO: u8 = 0x01 | CRITICAL_BIT;
    const COMPRESSION_ALG: u8 = 0x02;
    const ENCRYPTION_TAG: u8 = 0x03;
    const TENSOR_SHAPE: u8 = 0x04;
    const TRACE_ID: u8 = 0x05;
    const HOP_COUNT: u8 = 0x06;
    const SEMANTIC_ADDRESS: u8 = 0x07 | CRITICAL_BIT;
    const GPU_HINT: u8 = 0x08;

    fn from_byte(b: u8) -> Self {
        match b {
            Self::FRAGMENT_INFO => OptionType::FragmentInfo,
            Self::COMPRESSION_ALG => OptionType::CompressionAlg,
            Self::ENCRYPTION_TAG => OptionType::EncryptionTag,
            Self::TENSOR_SHAPE => OptionType::TensorShape,
            Self::TRACE_ID => OptionType::TraceId,
            Self::HOP_COUNT => OptionType::HopCount,
            Self::SEMANTIC_ADDRESS => OptionType::SemanticAddress,
            Self::GPU_HINT => OptionType::GpuHint,
            other => OptionType::Unknown(other),
        }
    }

    fn to_byte(self) -> u8 {
        match self {
            OptionType::FragmentInfo => Self::FRAGMENT_INFO,
            OptionType::CompressionAlg => Self::COMPRESSION_ALG,
            OptionType::EncryptionTag => Self::ENCRYPTION_TAG,
            OptionType::TensorShape => Self::TENSOR_SHAPE,
            OptionType::TraceId => Self::TRACE_ID,
            OptionType::HopCount => Self::HOP_COUNT,
            OptionType::SemanticAddress => Self::SEMANTIC_ADDRESS,
            OptionType::GpuHint => Self::GPU_HINT,
            OptionType::Unknown(b) => b,
        }
    }

    fn is_critical(byte: u8) -> bool {
        byte & CRITICAL_BIT != 0
    }
}

/// A decoded TLV option, borrowing its value from the source buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Option_<'a> {
    pub ty: OptionType,
    pub value: &'a [u8],
}

/// An owned TLV option, for building an options region to encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedOption {
    pub ty: OptionType,
    pub value: Vec<u8>,
}

/// Encode a sequence of options into `out`, returning the number of bytes
/// written. Fails if the region would exceed [`crate::header::MAX_OPTIONS_LEN`].
pub fn encode_options(options: &[OwnedOption], out: &mut Vec<u8>) -> Result<(), FrameError> {
    let mut written = 0usize;
    for opt in options {
        let len = opt.value.len();
        if len > u8::MAX as usize {
            return Err(FrameError::OptionTooLong(len as u16));
        }
        written += 2 + len;
        if written > crate::header::MAX_OPTIONS_LEN {
            return Err(FrameError::OptionTooLong(written as u16));
        }
        out.push(opt.ty.to_byte());
        out.push(len as u8);
        out.extend_from_slice(&opt.value);
    }
    Ok(())
}

/// Decode the options region, returning the parsed options. Unknown
/// non-critical options are included as `OptionType::Unknown`; unknown
/// critical options fail decoding.
pub fn decode_options(buf: &[u8]) -> Result<Vec<Option_<'_>>, FrameError> {
    let mut out = Vec::new();
    let mut pos = 0usize;
    while pos < buf.len() {
        if pos + 2 > buf.len() {
            return Err(FrameError::BufferTooShort {
                need: pos + 2,
                have: buf.len(),
            });
        }
        let ty_byte = buf[pos];
        let len = buf[pos + 1] as usize;
        pos += 2;
        if pos + len > buf.len() {
            return Err(FrameError::BufferTooShort {
                need: pos + len,
                have: buf.len(),
            });
        }
        let value = &buf[pos..pos + len];
        pos += len;

        let ty = OptionType::from_byte(ty_byte);
        if matches!(ty, OptionType::Unknown(_)) && OptionType::is_critical(ty_byte) {
            return Err(FrameError::UnknownCriticalOption(ty_byte));
        }
        out.push(Option_ { ty, value });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_known_options() {
        let opts = vec![
            OwnedOption {
                ty: OptionType::TraceId,
                value: vec![0xAA; 16],
            },
            OwnedOption {
                ty: OptionType::HopCount,
                value: vec![3],
            },
        ];
        let mut buf = Vec::new();
        encode_options(&opts, &mut buf).unwrap();
        let decoded = decode_options(&buf).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].ty, OptionType::TraceId);
        assert_eq!(decoded[0].value, &[0xAA; 16][..]);
        assert_eq!(decoded[1].ty, OptionType::HopCount);
        assert_eq!(decoded[1].value, &[3][..]);
    }

    #[test]
    fn unknown_critical_option_fails() {
        let buf = [0x80 | 0x7Fu8, 0x01, 0x00];
        assert_eq!(
            decode_options(&buf).unwrap_err(),
            FrameError::UnknownCriticalOption(0xFF)
        );
    }

    #[test]
    fn unknown_noncritical_option_is_skipped_not_fatal() {
        let buf = [0x7Fu8, 0x01, 0x00];
        let decoded = decode_options(&buf).unwrap();
        assert_eq!(decoded.len(), 1);
        assert!(matches!(decoded[0].ty, OptionType::Unknown(0x7F)));
    }
}
