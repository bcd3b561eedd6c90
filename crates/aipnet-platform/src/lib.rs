//! Platform interface (spec §4.4): abstracts frame send/recv over a backend
//! (in-memory loopback, UDP overlay, or an external kernel-bypass backend).

pub mod error;
pub mod mock;
pub mod overlay;

pub use error::PlatformError;
pub use mock::MockPlatform;
pub use overlay::OverlayPlatform;

/// Send/recv contract every backend implements. `recv` never suspends: it
/// returns [`PlatformError::Empty`] immediately when nothing is queued
/// (spec §5 "Suspension points").
pub trait Platform: Send + Sync {
    fn send(&self, frame_bytes: &[u8]) -> Result<(), PlatformError>;
    fn recv(&self, out_buf: &mut [u8]) -> Result<usize, PlatformError>;
    fn close(&self);
    fn is_closed(&self) -> bool;
}

/// Unified handle over the backends this crate ships. Kernel-bypass
/// backends (DPDK, XDP/AF_XDP, SmartNIC) are external collaborators behind
/// the same [`Platform`] trait and are not enumerated here (spec §1).
pub enum Backend {
    Mock(MockPlatform),
    Overlay(OverlayPlatform),
}

impl Platform for Backend {
    fn send(&self, frame_bytes: &[u8]) -> Result<(), PlatformError> {
        match self {
            Backend::Mock(p) => p.send(frame_bytes),
            Backend::Overlay(p) => p.send(frame_bytes),
        }
    }

    fn recv(&self, out_buf: &mut [u8]) -> Result<usize, PlatformError> {
        match self {
            Backend::Mock(p) => p.recv(out_buf),
            Backend::Overlay(p) => p.recv(out_buf),
        }
    }

    fn close(&self) {
        match self {
            Backend::Mock(p) => p.close(),
            Backend::Overlay(p) => p.close(),
        }
    }

    fn is_closed(&self) -> bool {
        match self {
            Backend::Mock(p) => p.is_closed(),
            Backend::Overlay(p) => p.is_closed(),
        }
    }
}
