//! UDP overlay platform backend (spec §4.3, §4.4).

use std::net::{ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};

use aipnet_frame::overlay::{decapsulate, encapsulate, OVERLAY_PORT};

use crate::error::PlatformError;
use crate::Platform;

/// Overlay backend: wraps frames in the 8-byte overlay header and ships them
/// as UDP datagrams to [`OVERLAY_PORT`].
pub struct OverlayPlatform {
    socket: UdpSocket,
    vni: u32,
    closed: AtomicBool,
}

impl OverlayPlatform {
    /// Bind a socket and connect it to `peer`, for a single point-to-point
    /// overlay path. `vni` is the 24-bit virtual network id stamped on every
    /// outgoing datagram.
    pub fn connect(bind: impl ToSocketAddrs, peer: impl ToSocketAddrs, vni: u32) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(bind)?;
        socket.connect(peer)?;
        socket.set_nonblocking(true)?;
        Ok(Self { socket, vni, closed: AtomicBool::new(false) })
    }

    /// Bind a socket to the default overlay port on `addr`.
    pub fn bind_default(addr: std::net::IpAddr) -> std::io::Result<UdpSocket> {
        UdpSocket::bind((addr, OVERLAY_PORT))
    }
}

impl Platform for OverlayPlatform {
    fn send(&self, frame_bytes: &[u8]) -> Result<(), PlatformError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PlatformError::Closed);
        }
        let datagram = encapsulate(self.vni, frame_bytes);
        self.socket.send(&datagram)?;
        Ok(())
    }

    fn recv(&self, out_buf: &mut [u8]) -> Result<usize, PlatformError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PlatformError::Closed);
        }
        let mut scratch = vec![0u8; out_buf.len() + 8];
        match self.socket.recv(&mut scratch) {
            Ok(n) => {
                let (_vni, inner) = decapsulate(&scratch[..n])
                    .map_err(|_| PlatformError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, "bad overlay header")))?;
                if inner.len() > out_buf.len() {
                    return Err(PlatformError::Io(std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "out_buf too small for received datagram",
                    )));
                }
                out_buf[..inner.len()].copy_from_slice(inner);
                Ok(inner.len())
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Err(PlatformError::Empty),
            Err(e) => Err(PlatformError::Io(e)),
        }
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
    fn loopback_udp_round_trip() {
        let a = OverlayPlatform::connect("127.0.0.1:0", "127.0.0.1:0", 7).unwrap();
        let a_addr = a.socket.local_addr().unwrap();
        let b = OverlayPlatform::connect("127.0.0.1:0", a_addr, 7).unwrap();
        let b_addr = b.socket.local_addr().unwrap();
        a.socket.connect(b_addr).unwrap();

        a.send(b"ping").unwrap();
        let mut buf = [0u8; 64];
        // Poll briefly; loopback UDP delivery is effectively immediate.
        let mut n = 0;
        for _ in 0..1000 {
            match b.recv(&mut buf) {
                Ok(len) => {
                    n = len;
                    break;
                }
                Err(PlatformError::Empty) => std::thread::yield_now(),
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(&buf[..n], b"ping");
    }

    #[test]
    fn closed_backend_rejects_send_and_recv() {
        let a = OverlayPlatform::connect("127.0.0.1:0", "127.0.0.1:1", 7).unwrap();
        a.close();
        assert!(a.is_closed());
        assert!(matches!(a.send(b"ping"), Err(PlatformError::Closed)));
        assert!(matches!(a.recv(&mut [0u8; 64]), Err(PlatformError::Closed)));
    }
}
