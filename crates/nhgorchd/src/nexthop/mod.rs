//! Single next hops: identity and reference-counted resolution.
//!
//! Plain IP next hops are owned by the neighbor subsystem and only looked
//! up here. MPLS labeled next hops are created lazily through the SAI layer
//! once their IP next hop is resolved and their interface is up.

mod key;
mod resolver;

pub use key::NextHopKey;
pub use resolver::NextHopResolver;
