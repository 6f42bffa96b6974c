//! Route keys and targets.

use crate::error::{NhgError, Result};
use crate::nhg::{parse_members, RequestedMember};
use sonic_orch_common::KeyOpFieldsValues;
use sonic_sai::RouteEntry;
use sonic_types::{IpPrefix, MplsLabel};
use std::fmt;

/// Key of a ROUTE_TABLE or LABEL_ROUTE_TABLE entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RouteKey {
    Prefix {
        vrf: Option<String>,
        prefix: IpPrefix,
    },
    Label(MplsLabel),
}

impl RouteKey {
    /// Parses a ROUTE_TABLE key: `10.0.0.0/24` or `Vrf-red:10.0.0.0/24`.
    ///
    /// Only keys starting with `Vrf` carry a VRF; IPv6 prefixes contain
    /// colons of their own.
    pub fn parse_prefix(key: &str) -> Result<Self> {
        let (vrf, prefix) = match key.split_once(':') {
            Some((vrf, prefix)) if vrf.starts_with("Vrf") => (Some(vrf.to_string()), prefix),
            _ => (None, key),
        };
        let prefix: IpPrefix = prefix
            .parse()
            .map_err(|e| NhgError::malformed(format!("route key {}: {}", key, e)))?;
        Ok(RouteKey::Prefix { vrf, prefix })
    }

    /// Parses a LABEL_ROUTE_TABLE key.
    pub fn parse_label(key: &str) -> Result<Self> {
        key.parse::<MplsLabel>()
            .map(RouteKey::Label)
            .map_err(|e| NhgError::malformed(format!("label route key {}: {}", key, e)))
    }

    pub fn to_entry(&self) -> RouteEntry {
        match self {
            RouteKey::Prefix { vrf, prefix } => RouteEntry::Ip {
                vrf: vrf.clone(),
                destination: *prefix,
            },
            RouteKey::Label(label) => RouteEntry::inseg(*label),
        }
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteKey::Prefix {
                vrf: Some(vrf),
                prefix,
            } => write!(f, "{}:{}", vrf, prefix),
            RouteKey::Prefix { vrf: None, prefix } => write!(f, "{}", prefix),
            RouteKey::Label(label) => write!(f, "{}", label),
        }
    }
}

/// What a route forwards to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    /// `nexthop_group` field: a named or class-based group
    Group(String),
    /// `nexthop`/`ifname`/`weight` fields
    Inline(Vec<RequestedMember>),
}

impl RouteTarget {
    pub fn from_fields(entry: &KeyOpFieldsValues) -> Result<Self> {
        let group = entry.get_field("nexthop_group");
        let nexthop = entry.get_field("nexthop");

        match (group, nexthop) {
            (Some(_), Some(_)) => Err(NhgError::malformed(format!(
                "route {} has both nexthop_group and nexthop",
                entry.key
            ))),
            (Some(group), None) => {
                let group = group.trim();
                if group.is_empty() {
                    return Err(NhgError::malformed(format!(
                        "route {} has an empty nexthop_group",
                        entry.key
                    )));
                }
                Ok(RouteTarget::Group(group.to_string()))
            }
            (None, Some(_)) => parse_members(
                nexthop,
                entry.get_field("ifname"),
                entry.get_field("weight"),
            )
            .map(RouteTarget::Inline),
            (None, None) => Err(NhgError::malformed(format!(
                "route {} has neither nexthop_group nor nexthop",
                entry.key
            ))),
        }
    }
}
