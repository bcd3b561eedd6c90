//! Gossip wire codec (spec §6 "Gossip on-the-wire"): a hand-rolled, fixed
//! packed header plus a variable payload, mirroring
//! `aipnet_frame::header::FrameHeader`'s byte-layout style.
//!
//! ```text
//! 0      msg_type      (u8)
//! 1      ttl           (u8)
//! 2..18  sender_id     (16 bytes)
//! 18..34 origin_id     (16 bytes)
//! 34..36 payload_len   (u16)
//! 36..100 signature    (64 bytes)
//! 100..   payload      (payload_len bytes)
//! ```
//!
//! The signature covers only the header prefix — bytes `0..36`, everything up
//! to `signature` — not the payload, exactly as spec'd.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

use crate::message::GossipMessage;

pub type NodeIdBytes = [u8; 16];

/// Length of the header prefix the signature covers (`msg_type..payload_len`).
pub const PREFIX_LEN: usize = 36;
/// Length of the signature field.
pub const SIGNATURE_LEN: usize = 64;
/// Length of the full fixed header, prefix plus signature.
pub const HEADER_LEN: usize = PREFIX_LEN + SIGNATURE_LEN;

const MSG_JOIN: u8 = 0x01;
const MSG_FORWARD_JOIN: u8 = 0x02;
const MSG_DISCONNECT: u8 = 0x03;
const MSG_SHUFFLE: u8 = 0x04;
const MSG_SHUFFLE_REPLY: u8 = 0x05;
const MSG_ADVERTISE: u8 = 0x06;

#[derive(Debug)]
pub enum WireError {
    BufferTooShort,
    PayloadLengthMismatch { declared: u16, actual: usize },
    BadMessageType(u8),
    BadShufflePayload,
    BadAdvertisePayload,
    MissingSignature,
    BadSignature,
}

impl std::fmt::Display for WireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireError::BufferTooShort => write!(f, "buffer too short for gossip header"),
            WireError::PayloadLengthMismatch { declared, actual } => {
                write!(f, "payload_len {declared} does not match {actual} remaining bytes")
            }
            WireError::BadMessageType(t) => write!(f, "unknown gossip msg_type {t}"),
            WireError::BadShufflePayload => write!(f, "shuffle payload is not a whole number of node ids"),
            WireError::BadAdvertisePayload => write!(f, "advertise payload shorter than its fixed fields"),
            WireError::MissingSignature => write!(f, "signature required but absent"),
            WireError::BadSignature => write!(f, "signature verification failed"),
        }
    }
}

impl std::error::Error for WireError {}

/// A gossip message plus its packed header, ready to go on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub msg_type: u8,
    pub ttl: u8,
    pub sender_id: NodeIdBytes,
    pub origin_id: NodeIdBytes,
    pub payload: Vec<u8>,
    pub signature: [u8; SIGNATURE_LEN],
}

impl Envelope {
    /// Build an unsigned envelope from an in-process message.
    pub fn unsigned(message: &GossipMessage) -> Self {
        let (msg_type, ttl, sender_id, origin_id) = header_fields(message);
        Self {
            msg_type,
            ttl,
            sender_id,
            origin_id,
            payload: encode_payload(message),
            signature: [0u8; SIGNATURE_LEN],
        }
    }

    /// Build a signed envelope; the signature covers the header prefix only.
    pub fn signed(message: &GossipMessage, key: &SigningKey) -> Self {
        let mut envelope = Self::unsigned(message);
        envelope.sign(key);
        envelope
    }

    /// Recover the in-process [`GossipMessage`] this envelope carries.
    pub fn to_message(&self) -> Result<GossipMessage, WireError> {
        decode_payload(self.msg_type, self.ttl, self.sender_id, self.origin_id, &self.payload)
    }

    fn prefix(&self) -> [u8; PREFIX_LEN] {
        let mut out = [0u8; PREFIX_LEN];
        out[0] = self.msg_type;
        out[1] = self.ttl;
        out[2..18].copy_from_slice(&self.sender_id);
        out[18..34].copy_from_slice(&self.origin_id);
        out[34..36].copy_from_slice(&(self.payload.len() as u16).to_be_bytes());
        out
    }

    /// Sign the header prefix with `key`, storing the result in `signature`.
    pub fn sign(&mut self, key: &SigningKey) {
        let sig: Signature = key.sign(&self.prefix());
        self.signature = sig.to_bytes();
    }

    /// Verify the header-prefix signature against `key`. `require` mirrors
    /// the trust layer's authentication toggle (spec §4.8: "unsigned
    /// messages are rejected when authentication is enabled").
    pub fn verify(&self, key: &VerifyingKey, require: bool) -> Result<(), WireError> {
        if self.signature == [0u8; SIGNATURE_LEN] {
            return if require { Err(WireError::MissingSignature) } else { Ok(()) };
        }
        let sig = Signature::from_bytes(&self.signature);
        key.verify(&self.prefix(), &sig).map_err(|_| WireError::BadSignature)
    }

    /// Encode to the packed wire format: header then payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len());
        out.extend_from_slice(&self.prefix());
        out.extend_from_slice(&self.signature);
        out.extend_from_slice(&self.payload);
        out
    }

    /// Decode the packed wire format, validating the declared payload length
    /// against what's actually present.
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < HEADER_LEN {
            return Err(WireError::BufferTooShort);
        }
        let msg_type = buf[0];
        let ttl = buf[1];
        let mut sender_id = [0u8; 16];
        sender_id.copy_from_slice(&buf[2..18]);
        let mut origin_id = [0u8; 16];
        origin_id.copy_from_slice(&buf[18..34]);
        let payload_len = u16::from_be_bytes([buf[34], buf[35]]);
        let mut signature = [0u8; SIGNATURE_LEN];
        signature.copy_from_slice(&buf[PREFIX_LEN..HEADER_LEN]);

        let payload = &buf[HEADER_LEN..];
        if payload.len() != payload_len as usize {
            return Err(WireError::PayloadLengthMismatch { declared: payload_len, actual: payload.len() });
        }

        Ok(Self {
            msg_type,
            ttl,
            sender_id,
            origin_id,
            payload: payload.to_vec(),
            signature,
        })
    }
}

fn header_fields(message: &GossipMessage) -> (u8, u8, NodeIdBytes, NodeIdBytes) {
    match *message {
        GossipMessage::Join { sender, origin } => (MSG_JOIN, 0, sender, origin),
        GossipMessage::ForwardJoin { sender, origin, ttl } => (MSG_FORWARD_JOIN, ttl, sender, origin),
        GossipMessage::Disconnect { sender } => (MSG_DISCONNECT, 0, sender, [0u8; 16]),
        GossipMessage::Shuffle { sender, origin, .. } => (MSG_SHUFFLE, 0, sender, origin),
        GossipMessage::ShuffleReply { sender, .. } => (MSG_SHUFFLE_REPLY, 0, sender, [0u8; 16]),
        GossipMessage::Advertise { sender, .. } => (MSG_ADVERTISE, 0, sender, [0u8; 16]),
    }
}

fn encode_payload(message: &GossipMessage) -> Vec<u8> {
    match message {
        GossipMessage::Join { .. } | GossipMessage::ForwardJoin { .. } | GossipMessage::Disconnect { .. } => Vec::new(),
        GossipMessage::Shuffle { entries, .. } | GossipMessage::ShuffleReply { entries, .. } => {
            entries.iter().flat_map(|id| id.iter().copied()).collect()
        }
        GossipMessage::Advertise { sad, latency_us, region, .. } => {
            let mut out = Vec::with_capacity(6 + sad.len());
            out.extend_from_slice(&latency_us.to_be_bytes());
            out.extend_from_slice(&region.to_be_bytes());
            out.extend_from_slice(sad);
            out
        }
    }
}

fn decode_payload(
    msg_type: u8,
    ttl: u8,
    sender_id: NodeIdBytes,
    origin_id: NodeIdBytes,
    payload: &[u8],
) -> Result<GossipMessage, WireError> {
    match msg_type {
        MSG_JOIN => Ok(GossipMessage::Join { sender: sender_id, origin: origin_id }),
        MSG_FORWARD_JOIN => Ok(GossipMessage::ForwardJoin { sender: sender_id, origin: origin_id, ttl }),
        MSG_DISCONNECT => Ok(GossipMessage::Disconnect { sender: sender_id }),
        MSG_SHUFFLE => Ok(GossipMessage::Shuffle { sender: sender_id, origin: origin_id, entries: decode_node_ids(payload)? }),
        MSG_SHUFFLE_REPLY => Ok(GossipMessage::ShuffleReply { sender: sender_id, entries: decode_node_ids(payload)? }),
        MSG_ADVERTISE => {
            if payload.len() < 6 {
                return Err(WireError::BadAdvertisePayload);
            }
            let latency_us = u32::from_be_bytes(payload[0..4].try_into().unwrap());
            let region = u16::from_be_bytes([payload[4], payload[5]]);
            Ok(GossipMessage::Advertise { sender: sender_id, sad: payload[6..].to_vec(), latency_us, region })
        }
        other => Err(WireError::BadMessageType(other)),
    }
}

fn decode_node_ids(payload: &[u8]) -> Result<Vec<NodeIdBytes>, WireError> {
    if payload.len() % 16 != 0 {
        return Err(WireError::BadShufflePayload);
    }
    Ok(payload.chunks_exact(16).map(|c| c.try_into().unwrap()).collect())
}
