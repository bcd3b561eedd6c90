//! Lock-free single-producer/single-consumer ring buffer.
//!
//! Carries frames between a producer (platform backend) and a consumer
//! (frame codec / demultiplexer) without heap allocation after
//! construction. See [`spsc::SpscRing`] for the reserve/commit/peek/release
//! contract.

pub mod region;
pub mod spsc;

pub use region::Region;
pub use spsc::{RingError, Slot, SpscRing};
