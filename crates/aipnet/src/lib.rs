//! AI-native network protocol core.
//!
//! This crate re-exports the public surface of the per-layer crates so
//! applications depend on a single entry point:
//!
//! - [`frame`] — wire frame header, CRC, fragmentation, overlay encapsulation.
//! - [`ring`] — the SPSC ring buffer linking platform and frame codec.
//! - [`platform`] — send/recv backends (loopback, UDP overlay).
//! - [`routing`] — semantic address descriptors, the resolver, the
//!   concurrent routing table, and Maglev multipath selection.
//! - [`gossip`] — HyParView membership and signed gossip messages.
//! - [`transport`] — connection/stream state machines, the multiplexer,
//!   congestion control, loss detection, RTT estimation, and the timer
//!   wheel.

#[doc(hidden)]
pub extern crate tracing;

pub use aipnet_frame as frame;
pub use aipnet_gossip as gossip;
pub use aipnet_platform as platform;
pub use aipnet_ring as ring;
pub use aipnet_routing as routing;
pub use aipnet_transport as transport;

pub use aipnet_frame::{FrameError, FrameHeader, FrameType, NodeId, QosClass};
pub use aipnet_platform::{Backend, Platform, PlatformError};
pub use aipnet_routing::{RouteEntry, RoutingTable, Sad, SadError};
pub use aipnet_transport::{Connection, ConnectionState};

/// Convenient imports for building on top of this crate.
pub mod prelude {
    pub use crate::{Backend, Connection, ConnectionState, FrameHeader, FrameType, NodeId, Platform, RouteEntry, RoutingTable, Sad};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facade_reexports_resolve_to_the_same_types() {
        let _: Option<NodeId> = None;
        let table = RoutingTable::new();
        assert!(table.is_empty());
    }
}
