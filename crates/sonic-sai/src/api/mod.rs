//! SAI API contracts consumed by the orchestration layer.
//!
//! - [`next_hop_group`]: next hops, next-hop groups and group members
//! - [`route`]: route and MPLS in-segment entry keys

pub mod next_hop_group;
pub mod route;

pub use next_hop_group::{GroupMemberSpec, NextHopGroupApi, NextHopGroupType, NextHopSpec};
pub use route::RouteEntry;
