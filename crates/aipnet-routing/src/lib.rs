//! Semantic routing layer: SAD codec, resolver scoring, the concurrent
//! routing table, and Maglev multipath selection.

pub mod maglev;
pub mod resolver;
pub mod sad;
pub mod table;

pub use maglev::{Backend as MaglevBackend, MaglevTable};
pub use resolver::{score, top_k, CandidateMetrics, Weights, DISQUALIFIED};
pub use sad::{FieldType, Sad, SadError};
pub use table::{RouteEntry, RoutingTable};
