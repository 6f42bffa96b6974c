//! Reference-counted next-hop resolution.

use super::NextHopKey;
use log::{debug, info, warn};
use sonic_orch_common::{HasRefCount, SyncMap};
use sonic_sai::{NextHopGroupApi, NextHopOid};
use sonic_types::IpAddress;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Demand recorded for one next hop.
#[derive(Debug, Clone, Default)]
struct ResolverEntry {
    ref_count: u32,
    /// Labeled next hop created by this resolver.
    created: Option<NextHopOid>,
}

impl HasRefCount for ResolverEntry {
    fn increment_ref(&mut self) -> u32 {
        self.ref_count += 1;
        self.ref_count
    }

    fn decrement_ref(&mut self) -> Option<u32> {
        self.ref_count = self.ref_count.checked_sub(1)?;
        Some(self.ref_count)
    }

    fn ref_count(&self) -> u32 {
        self.ref_count
    }
}

/// Counters for labeled next-hop programming.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolverStats {
    pub labeled_created: u64,
    pub labeled_removed: u64,
    pub creation_failures: u64,
}

/// Tracks which next hops are usable and who needs them.
///
/// Unlabeled next hops resolve to the handle reported by the neighbor
/// subsystem. Labeled next hops are created on demand once their IP next
/// hop is resolved and their interface is up; a failed creation is simply
/// absence and is retried on the next neighbor or link event for that next
/// hop.
///
/// Next hops that lose their last reference, or whose interface goes down,
/// are not removed right away: group members may still point at them. They
/// are collected and removed by [`flush_retired`](Self::flush_retired) once
/// the groups have been repaired.
pub struct NextHopResolver {
    sai: Arc<dyn NextHopGroupApi>,
    neighbors: BTreeMap<(IpAddress, String), NextHopOid>,
    down_links: BTreeSet<String>,
    entries: SyncMap<NextHopKey, ResolverEntry>,
    retired: Vec<NextHopOid>,
    stats: ResolverStats,
}

impl NextHopResolver {
    pub fn new(sai: Arc<dyn NextHopGroupApi>) -> Self {
        Self {
            sai,
            neighbors: BTreeMap::new(),
            down_links: BTreeSet::new(),
            entries: SyncMap::new(),
            retired: Vec::new(),
            stats: ResolverStats::default(),
        }
    }

    pub fn stats(&self) -> &ResolverStats {
        &self.stats
    }

    /// Current handle of a next hop, `None` when it is unusable.
    pub fn handle(&self, key: &NextHopKey) -> Option<NextHopOid> {
        if self.down_links.contains(key.alias()) {
            return None;
        }
        if key.is_labeled() {
            self.entries.get(key).and_then(|e| e.created)
        } else {
            self.neighbors
                .get(&(key.ip(), key.alias().to_string()))
                .copied()
        }
    }

    pub fn is_reachable(&self, key: &NextHopKey) -> bool {
        self.handle(key).is_some()
    }

    pub fn ref_count(&self, key: &NextHopKey) -> u32 {
        self.entries.ref_count(key).unwrap_or(0)
    }

    pub fn is_link_up(&self, alias: &str) -> bool {
        !self.down_links.contains(alias)
    }

    /// Records one more user of `key` and returns its handle if usable.
    pub fn acquire(&mut self, key: &NextHopKey) -> Option<NextHopOid> {
        if self.entries.increment_ref(key).is_err() {
            self.entries.insert(
                key.clone(),
                ResolverEntry {
                    ref_count: 1,
                    created: None,
                },
            );
        }
        if key.is_labeled() {
            self.materialize(key);
        }
        self.handle(key)
    }

    /// Drops one user of `key`.
    pub fn release(&mut self, key: &NextHopKey) {
        match self.entries.decrement_ref(key) {
            Ok(0) => {
                if let Some(oid) = self.entries.remove(key).and_then(|e| e.created) {
                    debug!("NextHopResolver: retiring next hop {} ({})", key, oid);
                    self.retired.push(oid);
                }
            }
            Ok(_) => {}
            Err(e) => warn!("NextHopResolver: release of {} failed: {}", key, e),
        }
    }

    /// Applies a neighbor resolution change.
    ///
    /// Returns the referenced keys whose handle changed.
    pub fn on_neighbor(
        &mut self,
        ip: IpAddress,
        alias: &str,
        next_hop: Option<NextHopOid>,
    ) -> Vec<NextHopKey> {
        let affected: Vec<NextHopKey> = self
            .entries
            .keys()
            .filter(|k| k.ip() == ip && k.alias() == alias)
            .cloned()
            .collect();
        let before = self.snapshot(&affected);

        let neighbor = (ip, alias.to_string());
        match next_hop {
            Some(oid) => {
                self.neighbors.insert(neighbor, oid);
            }
            None => {
                self.neighbors.remove(&neighbor);
            }
        }

        for key in affected.iter().filter(|k| k.is_labeled()) {
            if next_hop.is_some() {
                self.materialize(key);
            } else {
                self.retire(key);
            }
        }

        self.changed(affected, before)
    }

    /// Applies an interface oper-status change.
    ///
    /// Returns the referenced keys whose handle changed.
    pub fn on_link(&mut self, alias: &str, up: bool) -> Vec<NextHopKey> {
        let toggled = if up {
            self.down_links.remove(alias)
        } else {
            self.down_links.insert(alias.to_string())
        };
        if !toggled {
            return Vec::new();
        }
        info!(
            "NextHopResolver: link {} is {}",
            alias,
            if up { "up" } else { "down" }
        );

        let affected: Vec<NextHopKey> = self
            .entries
            .keys()
            .filter(|k| k.alias() == alias)
            .cloned()
            .collect();
        // Handles before the toggle, computed as if the link kept its old state.
        let before: Vec<Option<NextHopOid>> = affected
            .iter()
            .map(|k| {
                if up {
                    None
                } else if k.is_labeled() {
                    self.entries.get(k).and_then(|e| e.created)
                } else {
                    self.neighbors
                        .get(&(k.ip(), k.alias().to_string()))
                        .copied()
                }
            })
            .collect();

        for key in affected.iter().filter(|k| k.is_labeled()) {
            if up {
                self.materialize(key);
            } else {
                self.retire(key);
            }
        }

        self.changed(affected, before)
    }

    /// Removes next hops that are no longer used by any group.
    pub fn flush_retired(&mut self) {
        for oid in std::mem::take(&mut self.retired) {
            match self.sai.remove_next_hop(oid) {
                Ok(()) => self.stats.labeled_removed += 1,
                Err(e) => warn!("NextHopResolver: failed to remove next hop {}: {}", oid, e),
            }
        }
    }

    pub fn has_retired(&self) -> bool {
        !self.retired.is_empty()
    }

    fn materialize(&mut self, key: &NextHopKey) {
        let ready = self.is_link_up(key.alias())
            && self
                .neighbors
                .contains_key(&(key.ip(), key.alias().to_string()));
        let missing = matches!(self.entries.get(key), Some(e) if e.created.is_none());
        if !ready || !missing {
            return;
        }

        match self.sai.create_next_hop(&key.to_spec()) {
            Ok(oid) => {
                if let Some(entry) = self.entries.get_mut(key) {
                    entry.created = Some(oid);
                }
                self.stats.labeled_created += 1;
                debug!("NextHopResolver: created labeled next hop {} ({})", key, oid);
            }
            Err(e) => {
                self.stats.creation_failures += 1;
                warn!(
                    "NextHopResolver: failed to create labeled next hop {}: {}",
                    key, e
                );
            }
        }
    }

    fn retire(&mut self, key: &NextHopKey) {
        if let Some(oid) = self.entries.get_mut(key).and_then(|e| e.created.take()) {
            debug!("NextHopResolver: retiring next hop {} ({})", key, oid);
            self.retired.push(oid);
        }
    }

    fn snapshot(&self, keys: &[NextHopKey]) -> Vec<Option<NextHopOid>> {
        keys.iter().map(|k| self.handle(k)).collect()
    }

    fn changed(
        &self,
        keys: Vec<NextHopKey>,
        before: Vec<Option<NextHopOid>>,
    ) -> Vec<NextHopKey> {
        keys.into_iter()
            .zip(before)
            .filter(|(k, old)| self.handle(k) != *old)
            .map(|(k, _)| k)
            .collect()
    }
}
