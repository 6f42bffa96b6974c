//! Class-based forwarding groups.
//!
//! A class-based group selects one of its member groups by the packet's
//! forwarding class. Members are named next-hop groups; the class map sends
//! each forwarding class to a member position.

mod class_map;
mod manager;

pub use class_map::{ClassMap, MAX_FORWARDING_CLASS};
pub use manager::ClassBasedGroupManager;
