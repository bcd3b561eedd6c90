//! Frame link layer: 64-byte header, TLV options, CRC-32C trailer,
//! fragmentation, and UDP overlay encapsulation.

pub mod codec;
pub mod crc;
pub mod error;
pub mod fragment;
pub mod header;
pub mod options;
pub mod overlay;

pub use codec::{DecodedFrame, decode, encode};
pub use crc::crc32c;
pub use error::FrameError;
pub use header::{CRC_LEN, FrameFlags, FrameHeader, FrameType, HEADER_LEN, MAX_OPTIONS_LEN, NodeId, QosClass, PROTOCOL_VERSION};
pub use options::{Option_, OptionType, OwnedOption};
