//! HyParView peer sampling and membership gossip over the active/passive
//! view protocol (spec §4.8).

pub mod membership;
pub mod message;
pub mod wire;

pub use membership::{Config, Membership, Outcome};
pub use message::GossipMessage;
pub use wire::{Envelope, WireError};
