//! In-memory loopback platform backed by a ring buffer (spec §4.4: "`Mock` is
//! authoritative for tests").

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use aipnet_ring::{RingError, SpscRing};

use crate::error::PlatformError;
use crate::Platform;

/// Default slot size: large enough for a full-MTU frame plus a length prefix.
pub const DEFAULT_SLOT_SIZE: u32 = 2048;
/// Default ring depth.
pub const DEFAULT_CAPACITY: u32 = 64;

/// In-memory loopback backend. Frames written to one end's outgoing ring
/// appear on the other end's incoming ring with no copying beyond the ring's
/// own slot.
pub struct MockPlatform {
    tx: Arc<SpscRing>,
    rx: Arc<SpscRing>,
    closed: Arc<AtomicBool>,
}

impl MockPlatform {
    /// Construct a connected pair: what `a` sends, `b` receives, and vice versa.
    pub fn pair(capacity: u32, slot_size: u32) -> (Self, Self) {
        let ring_ab = Arc::new(SpscRing::new(capacity, slot_size));
        let ring_ba = Arc::new(SpscRing::new(capacity, slot_size));
        let a = Self {
            tx: ring_ab.clone(),
            rx: ring_ba.clone(),
            closed: Arc::new(AtomicBool::new(false)),
        };
        let b = Self {
            tx: ring_ba,
            rx: ring_ab,
            closed: Arc::new(AtomicBool::new(false)),
        };
        (a, b)
    }

    /// Construct a connected pair using the default capacity and slot size.
    pub fn pair_default() -> (Self, Self) {
        Self::pair(DEFAULT_CAPACITY, DEFAULT_SLOT_SIZE)
    }
}

impl Platform for MockPlatform {
    fn send(&self, frame_bytes: &[u8]) -> Result<(), PlatformError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PlatformError::Closed);
        }
        let slot_size = self.tx.slot_size() as usize;
        if frame_bytes.len() + 2 > slot_size {
            return Err(PlatformError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "frame exceeds ring slot size",
            )));
        }
        let (seq, mut slot) = match self.tx.reserve() {
            Ok(v) => v,
            Err(RingError::Full) => return Err(PlatformError::Resource(RingError::Full)),
            Err(e) => return Err(PlatformError::Resource(e)),
        };
        let buf = slot.as_mut();
        buf[..2].copy_from_slice(&(frame_bytes.len() as u16).to_le_bytes());
        buf[2..2 + frame_bytes.len()].copy_from_slice(frame_bytes);
        self.tx.commit(seq);
        Ok(())
    }

    fn recv(&self, out_buf: &mut [u8]) -> Result<usize, PlatformError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PlatformError::Closed);
        }
        let (seq, slot) = match self.rx.peek() {
            Ok(v) => v,
            Err(RingError::Empty) => return Err(PlatformError::Empty),
            Err(e) => return Err(PlatformError::Resource(e)),
        };
        let buf = slot.as_ref();
        let len = u16::from_le_bytes([buf[0], buf[1]]) as usize;
        if len > out_buf.len() {
            return Err(PlatformError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "out_buf too small for queued frame",
            )));
        }
        out_buf[..len].copy_from_slice(&buf[2..2 + len]);
        self.rx.release(seq);
        Ok(len)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_delivers_bytes_fifo() {
        let (a, b) = MockPlatform::pair_default();
        a.send(b"hello").unwrap();
        a.send(b"world").unwrap();

        let mut buf = [0u8; 64];
        let n = b.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");
        let n = b.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"world");
        assert!(matches!(b.recv(&mut buf), Err(PlatformError::Empty)));
    }

    #[test]
    fn recv_empty_when_nothing_sent() {
        let (_a, b) = MockPlatform::pair_default();
        let mut buf = [0u8; 64];
        assert!(matches!(b.recv(&mut buf), Err(PlatformError::Empty)));
    }

    #[test]
    fn closed_backend_rejects_send_and_recv() {
        let (a, b) = MockPlatform::pair_default();
        a.send(b"hello").unwrap();
        a.close();
        assert!(a.is_closed());
        assert!(matches!(a.send(b"world"), Err(PlatformError::Closed)));
        assert!(matches!(a.recv(&mut [0u8; 64]), Err(PlatformError::Closed)));
        // Closing `a` does not affect `b`'s independent lifecycle.
        assert!(!b.is_closed());
        let mut buf = [0u8; 64];
        let n = b.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");
    }
}
