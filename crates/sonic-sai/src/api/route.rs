//! Route and MPLS in-segment entry keys.

use sonic_types::{IpPrefix, MplsLabel};
use std::fmt;

/// A forwarding entry the switch resolves to a next hop or next-hop group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RouteEntry {
    /// IP route, optionally inside a named VRF.
    Ip {
        vrf: Option<String>,
        destination: IpPrefix,
    },
    /// MPLS in-segment entry keyed by the incoming label.
    Inseg { label: MplsLabel },
}

impl RouteEntry {
    /// IP route in the default VRF.
    pub fn ip(destination: IpPrefix) -> Self {
        RouteEntry::Ip {
            vrf: None,
            destination,
        }
    }

    pub fn inseg(label: MplsLabel) -> Self {
        RouteEntry::Inseg { label }
    }
}

impl fmt::Display for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteEntry::Ip {
                vrf: Some(vrf),
                destination,
            } => write!(f, "{}:{}", vrf, destination),
            RouteEntry::Ip {
                vrf: None,
                destination,
            } => write!(f, "{}", destination),
            RouteEntry::Inseg { label } => write!(f, "label {}", label),
        }
    }
}
