use std::fmt;

/// Platform send/recv failure. `Empty` is not an error condition — it is the
/// defined "no data available" return for a non-suspending `recv` (spec §5).
#[derive(Debug)]
pub enum PlatformError {
    /// No frame is available right now; the caller should not spin, but
    /// register a wake-up and yield instead (spec §5 "Suspension points").
    Empty,
    /// The backend has been closed and will never produce more frames.
    Closed,
    /// The ring backing a `Mock` backend is full.
    Resource(aipnet_ring::RingError),
    /// An I/O failure on a socket-backed backend (e.g. `Overlay`).
    Io(std::io::Error),
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformError::Empty => write!(f, "no data available"),
            PlatformError::Closed => write!(f, "platform backend closed"),
            PlatformError::Resource(e) => write!(f, "ring resource exhausted: {e}"),
            PlatformError::Io(e) => write!(f, "platform I/O error: {e}"),
        }
    }
}

impl std::error::Error for PlatformError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PlatformError::Io(e) => Some(e),
            PlatformError::Resource(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PlatformError {
    fn from(e: std::io::Error) -> Self {
        PlatformError::Io(e)
    }
}
