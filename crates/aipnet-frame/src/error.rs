use std::fmt;

/// Frame decode/encode failure. All variants are recoverable: the caller
/// drops the frame and increments a counter, never panics (spec §4.1, §8.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    BadVersion(u8),
    BadFrameType(u16),
    BadQosClass(u8),
    BadPriority(u8),
    BadTensorAlignment(u16),
    LengthMismatch { expected: u32, actual: u32 },
    OptionTooLong(u16),
    UnknownCriticalOption(u8),
    BadCrc { expected: u32, actual: u32 },
    BufferTooShort { need: usize, have: usize },
    FragmentTimeout,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::BadVersion(v) => write!(f, "unsupported protocol version {v}"),
            FrameError::BadFrameType(t) => write!(f, "unknown frame type {t}"),
            FrameError::BadQosClass(c) => write!(f, "unknown QoS class {c}"),
            FrameError::BadPriority(p) => write!(f, "priority {p} out of range 0..=15"),
            FrameError::BadTensorAlignment(a) => {
                write!(f, "tensor alignment {a} is not a power of two")
            }
            FrameError::LengthMismatch { expected, actual } => {
                write!(f, "total_frame_length {expected} does not match buffer length {actual}")
            }
            FrameError::OptionTooLong(len) => write!(f, "options region {len} exceeds 256 bytes"),
            FrameError::UnknownCriticalOption(ty) => {
                write!(f, "unknown critical option type {ty}")
            }
            FrameError::BadCrc { expected, actual } => {
                write!(f, "CRC mismatch: expected {expected:#010x}, computed {actual:#010x}")
            }
            FrameError::BufferTooShort { need, have } => {
                write!(f, "buffer too short: need at least {need} bytes, have {have}")
            }
            FrameError::FragmentTimeout => write!(f, "fragment reassembly timed out"),
        }
    }
}

impl std::error::Error for FrameError {}
