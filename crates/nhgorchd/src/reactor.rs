//! Link and neighbor events driving group membership repair.

use crate::nexthop::NextHopResolver;
use crate::nhg::{HandleChange, NextHopGroupStore};
use log::debug;
use serde::{Deserialize, Serialize};
use sonic_sai::{NextHopOid, RawSaiObjectId};
use sonic_types::IpAddress;

/// Interface oper-status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEvent {
    pub alias: String,
    pub up: bool,
}

/// Neighbor resolution change for (ip, alias).
///
/// `next_hop` is the neighbor subsystem's IP next-hop handle, absent when
/// the neighbor became unreachable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborEvent {
    pub ip: IpAddress,
    pub alias: String,
    #[serde(default)]
    pub next_hop: Option<RawSaiObjectId>,
}

impl NeighborEvent {
    pub fn next_hop(&self) -> Option<NextHopOid> {
        self.next_hop.and_then(NextHopOid::from_raw)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReactorStats {
    pub link_events: u64,
    pub neighbor_events: u64,
    /// Next hops whose handle changed
    pub next_hops_changed: u64,
}

/// Feeds reachability changes to the resolver and repairs every group that
/// uses an affected next hop.
///
/// The returned handle changes still have to reach the groups' referrers.
#[derive(Debug, Default)]
pub struct MembershipReactor {
    stats: ReactorStats,
}

impl MembershipReactor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &ReactorStats {
        &self.stats
    }

    pub fn on_link_event(
        &mut self,
        event: &LinkEvent,
        resolver: &mut NextHopResolver,
        store: &mut NextHopGroupStore,
    ) -> Vec<HandleChange> {
        self.stats.link_events += 1;
        let keys = resolver.on_link(&event.alias, event.up);
        self.stats.next_hops_changed += keys.len() as u64;
        debug!(
            "MembershipReactor: link {} up={} changed {} next hops",
            event.alias,
            event.up,
            keys.len()
        );
        store.repair(&keys, resolver)
    }

    pub fn on_neighbor_event(
        &mut self,
        event: &NeighborEvent,
        resolver: &mut NextHopResolver,
        store: &mut NextHopGroupStore,
    ) -> Vec<HandleChange> {
        self.stats.neighbor_events += 1;
        let keys = resolver.on_neighbor(event.ip, &event.alias, event.next_hop());
        self.stats.next_hops_changed += keys.len() as u64;
        debug!(
            "MembershipReactor: neighbor {}@{} changed {} next hops",
            event.ip,
            event.alias,
            keys.len()
        );
        store.repair(&keys, resolver)
    }
}
