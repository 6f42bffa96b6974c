//! Prefix and MPLS label routes bound to next-hop groups.

mod binder;
mod types;

pub use binder::{BinderStats, RouteBinder};
pub use types::{RouteKey, RouteTarget};
