//! Fixed 64-byte frame header layout (spec §3, §6).
//!
//! Byte layout (network byte order for multi-byte integers):
//!
//! ```text
//! 0      version            (u8, currently must be 1)
//! 1      flags              (u8 bitfield, see FrameFlags)
//! 2..4   frame_type         (u16)
//! 4..8   total_frame_length (u32)
//! 8..12  stream_id          (u32)
//! 12..16 sequence           (u32)
//! 16..32 src_node_id        (16 bytes)
//! 32..48 dst_node_id        (16 bytes)
//! 48     priority           (u8, 0..=15)
//! 49     qos_class          (u8 enum)
//! 50     tensor_dtype       (u8)
//! 51     reserved           (u8, must be 0)
//! 52..54 tensor_alignment   (u16, power of two when tensor_payload flag set)
//! 54..56 options_length     (u16, <= 256)
//! 56..64 timestamp_ns       (u64)
//! ```

use crate::error::FrameError;

/// Size of the fixed frame header in bytes.
pub const HEADER_LEN: usize = 64;
/// Size of the trailing CRC-32C in bytes.
pub const CRC_LEN: usize = 4;
/// Maximum TLV options region size, in bytes.
pub const MAX_OPTIONS_LEN: usize = 256;
/// Current wire protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// A 128-bit opaque node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub [u8; 16]);

impl NodeId {
    pub const ZERO: NodeId = NodeId([0u8; 16]);
}

/// Frame type enum (16-bit on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum FrameType {
    Data = 0,
    Control = 1,
    Heartbeat = 2,
    RouteAdvertisement = 3,
    TrustHandshake = 4,
    TensorTransfer = 5,
    StreamControl = 6,
}

impl FrameType {
    fn from_u16(v: u16) -> Result<Self, FrameError> {
        Ok(match v {
            0 => FrameType::Data,
            1 => FrameType::Control,
            2 => FrameType::Heartbeat,
            3 => FrameType::RouteAdvertisement,
            4 => FrameType::TrustHandshake,
            5 => FrameType::TensorTransfer,
            6 => FrameType::StreamControl,
            other => return Err(FrameError::BadFrameType(other)),
        })
    }
}

/// Delivery QoS class (spec §3, §4.11).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum QosClass {
    BestEffort = 0,
    ReliableOrdered = 1,
    ReliableUnordered = 2,
    Probabilistic = 3,
}

impl QosClass {
    fn from_u8(v: u8) -> Result<Self, FrameError> {
        Ok(match v {
            0 => QosClass::BestEffort,
            1 => QosClass::ReliableOrdered,
            2 => QosClass::ReliableUnordered,
            3 => QosClass::Probabilistic,
            other => return Err(FrameError::BadQosClass(other)),
        })
    }
}

bitflags::bitflags! {
    /// Header flag bitfield.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FrameFlags: u8 {
        const MORE_FRAGMENTS   = 1 << 0;
        const COMPRESSED       = 1 << 1;
        const ENCRYPTED        = 1 << 2;
        const TENSOR_PAYLOAD   = 1 << 3;
        const PRIORITY_EXPRESS = 1 << 4;
        const OVERLAY_ENCAP    = 1 << 5;
    }
}

/// Decoded fixed frame header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: u8,
    pub flags: FrameFlags,
    pub frame_type: FrameType,
    pub total_frame_length: u32,
    pub stream_id: u32,
    pub sequence: u32,
    pub src_node_id: NodeId,
    pub dst_node_id: NodeId,
    pub priority: u8,
    pub qos_class: QosClass,
    pub tensor_dtype: u8,
    pub tensor_alignment: u16,
    pub options_length: u16,
    pub timestamp_ns: u64,
}

impl FrameHeader {
    /// Encode the header to its fixed 64-byte wire form.
    pub fn encode(&self, out: &mut [u8; HEADER_LEN]) {
        out[0] = self.version;
        out[1] = self.flags.bits();
        out[2..4].copy_from_slice(&(self.frame_type as u16).to_be_bytes());
        out[4..8].copy_from_slice(&self.total_frame_length.to_be_bytes());
        out[8..12].copy_from_slice(&self.stream_id.to_be_bytes());
        out[12..16].copy_from_slice(&self.sequence.to_be_bytes());
        out[16..32].copy_from_slice(&self.src_node_id.0);
        out[32..48].copy_from_slice(&self.dst_node_id.0);
        out[48] = self.priority;
        out[49] = self.qos_class as u8;
        out[50] = self.tensor_dtype;
        out[51] = 0;
        out[52..54].copy_from_slice(&self.tensor_alignment.to_be_bytes());
        out[54..56].copy_from_slice(&self.options_length.to_be_bytes());
        out[56..64].copy_from_slice(&self.timestamp_ns.to_be_bytes());
    }

    /// Decode the fixed 64-byte header, validating version, priority range,
    /// and tensor alignment (power of two when the tensor flag is set).
    pub fn decode(buf: &[u8; HEADER_LEN]) -> Result<Self, FrameError> {
        let version = buf[0];
        if version != PROTOCOL_VERSION {
            return Err(FrameError::BadVersion(version));
        }
        let flags = FrameFlags::from_bits_truncate(buf[1]);
        let frame_type = FrameType::from_u16(u16::from_be_bytes([buf[2], buf[3]]))?;
        let total_frame_length = u32::from_be_bytes(buf[4..8].try_into().unwrap());
        let stream_id = u32::from_be_bytes(buf[8..12].try_into().unwrap());
        let sequence = u32::from_be_bytes(buf[12..16].try_into().unwrap());
        let mut src = [0u8; 16];
        src.copy_from_slice(&buf[16..32]);
        let mut dst = [0u8; 16];
        dst.copy_from_slice(&buf[32..48]);
        let priority = buf[48];
        if priority > 15 {
            return Err(FrameError::BadPriority(priority));
        }
        let qos_class = QosClass::from_u8(buf[49])?;
        let tensor_dtype = buf[50];
        let tensor_alignment = u16::from_be_bytes([buf[52], buf[53]]);
        if flags.contains(FrameFlags::TENSOR_PAYLOAD)
            && (tensor_alignment == 0 || !tensor_alignment.is_power_of_two())
        {
            return Err(FrameError::BadTensorAlignment(tensor_alignment));
        }
        let options_length = u16::from_be_bytes([buf[54], buf[55]]);
        if options_length as usize > MAX_OPTIONS_LEN {
            return Err(FrameError::OptionTooLong(options_length));
        }
        let timestamp_ns = u64::from_be_bytes(buf[56..64].try_into().unwrap());

        Ok(Self {
            version,
            flags,
            frame_type,
            total_frame_length,
            stream_id,
            sequence,
            src_node_id: NodeId(src),
            dst_node_id: NodeId(dst),
            priority,
            qos_class,
            tensor_dtype,
            tensor_alignment,
            options_length,
            timestamp_ns,
        })
    }
}
