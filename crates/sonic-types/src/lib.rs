//! Common SONiC types for next-hop group orchestration.
//!
//! - [`IpAddress`]: IPv4 and IPv6 addresses
//! - [`IpPrefix`]: IP network prefixes (CIDR notation)
//! - [`MplsLabel`] and [`LabelStack`]: MPLS labels pushed by labeled next hops
//!   and used as keys of label routes

mod ip;
mod label;

pub use ip::{IpAddress, IpPrefix};
pub use label::{LabelStack, MplsLabel};

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid IP prefix format: {0}")]
    InvalidIpPrefix(String),

    #[error("invalid MPLS label: {0} (must be 0-1048575)")]
    InvalidMplsLabel(String),

    #[error("invalid MPLS label stack: {0}")]
    InvalidLabelStack(String),
}
