//! Member list parsing and reachability filtering.
//!
//! Parsing is pure syntax and runs once per intent; the parsed request is
//! stored with the group and filtered again on every reachability change.

use crate::error::{NhgError, Result};
use crate::nexthop::{NextHopKey, NextHopResolver};
use sonic_sai::NextHopOid;
use sonic_types::{IpAddress, LabelStack};

/// Largest member weight accepted.
pub const MAX_WEIGHT: u32 = 255;

/// A member as requested by an intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedMember {
    pub key: NextHopKey,
    pub weight: u32,
}

impl RequestedMember {
    pub fn new(key: NextHopKey, weight: u32) -> Self {
        Self { key, weight }
    }
}

/// A requested member whose next hop is currently usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveMember {
    pub key: NextHopKey,
    pub weight: u32,
    pub handle: NextHopOid,
}

/// Parses the `nexthop`, `ifname` and `weight` fields of a group or route.
///
/// Duplicate next hops collapse onto their first position and the later
/// weight wins.
pub fn parse_members(
    nexthop: Option<&str>,
    ifname: Option<&str>,
    weight: Option<&str>,
) -> Result<Vec<RequestedMember>> {
    let nexthop = nexthop
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| NhgError::malformed("missing nexthop field"))?;
    let ips: Vec<&str> = nexthop.split(',').map(str::trim).collect();

    let aliases: Vec<&str> = ifname
        .map(|s| s.split(',').map(str::trim).collect())
        .unwrap_or_default();
    if aliases.len() != ips.len() {
        return Err(NhgError::malformed(format!(
            "{} next hops but {} interfaces",
            ips.len(),
            aliases.len()
        )));
    }

    let weights = match weight.map(str::trim) {
        None | Some("") => vec![1; ips.len()],
        Some(list) => parse_weights(list, ips.len())?,
    };

    let mut members: Vec<RequestedMember> = Vec::with_capacity(ips.len());
    for ((token, alias), weight) in ips.iter().zip(&aliases).zip(weights) {
        let key = parse_next_hop(token, alias)?;
        match members.iter_mut().find(|m| m.key == key) {
            Some(existing) => existing.weight = weight,
            None => members.push(RequestedMember::new(key, weight)),
        }
    }

    Ok(members)
}

fn parse_weights(list: &str, expected: usize) -> Result<Vec<u32>> {
    let weights = list
        .split(',')
        .map(|w| {
            let w = w.trim();
            match w.parse::<u32>() {
                Ok(v) if (1..=MAX_WEIGHT).contains(&v) => Ok(v),
                Ok(v) => Err(NhgError::malformed(format!(
                    "weight {} out of range 1-{}",
                    v, MAX_WEIGHT
                ))),
                Err(_) => Err(NhgError::malformed(format!("invalid weight '{}'", w))),
            }
        })
        .collect::<Result<Vec<u32>>>()?;

    if weights.len() != expected {
        return Err(NhgError::malformed(format!(
            "{} next hops but {} weights",
            expected,
            weights.len()
        )));
    }
    Ok(weights)
}

fn parse_next_hop(token: &str, alias: &str) -> Result<NextHopKey> {
    if alias.is_empty() {
        return Err(NhgError::malformed(format!(
            "next hop '{}' has an empty interface",
            token
        )));
    }

    let (labels, ip) = match token.split_once('+') {
        Some((labels, ip)) => (
            labels
                .parse::<LabelStack>()
                .map_err(|e| NhgError::malformed(e.to_string()))?,
            ip,
        ),
        None => (LabelStack::default(), token),
    };
    let ip = ip
        .parse::<IpAddress>()
        .map_err(|e| NhgError::malformed(e.to_string()))?;

    Ok(NextHopKey::new(ip, alias).with_labels(labels))
}

/// Keeps the requested members that are usable right now, in request order.
pub fn usable_members(
    requested: &[RequestedMember],
    resolver: &NextHopResolver,
) -> Vec<ActiveMember> {
    requested
        .iter()
        .filter_map(|m| {
            resolver.handle(&m.key).map(|handle| ActiveMember {
                key: m.key.clone(),
                weight: m.weight,
                handle,
            })
        })
        .collect()
}
