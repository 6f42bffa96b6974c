//! Route to group bindings.

use super::{RouteKey, RouteTarget};
use crate::audit::{AuditCategory, AuditRecord};
use crate::audit_log;
use crate::error::{NhgError, Result};
use crate::nexthop::NextHopResolver;
use crate::nhg::{ForwardingHandle, GroupId, HandleChange, NextHopGroupKey, NextHopGroupStore};
use log::{debug, error, info, warn};
use sonic_sai::NextHopGroupApi;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Route binding counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinderStats {
    /// Forwarding entries written, including repoints
    pub routes_programmed: u64,
    pub routes_withdrawn: u64,
    pub programming_failures: u64,
}

#[derive(Debug, Clone)]
struct BoundRoute {
    group: GroupId,
    /// Handle currently written to hardware
    handle: Option<ForwardingHandle>,
}

/// Binds prefix and label routes to groups and keeps their forwarding
/// entries pointed at the groups' current handles.
///
/// A route holds exactly one reference on its group. Rebinding acquires the
/// new group before the old one is released.
pub struct RouteBinder {
    sai: Arc<dyn NextHopGroupApi>,
    routes: BTreeMap<RouteKey, BoundRoute>,
    by_group: BTreeMap<GroupId, BTreeSet<RouteKey>>,
    stats: BinderStats,
}

impl RouteBinder {
    pub fn new(sai: Arc<dyn NextHopGroupApi>) -> Self {
        Self {
            sai,
            routes: BTreeMap::new(),
            by_group: BTreeMap::new(),
            stats: BinderStats::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn stats(&self) -> &BinderStats {
        &self.stats
    }

    pub fn contains(&self, key: &RouteKey) -> bool {
        self.routes.contains_key(key)
    }

    /// Handle the route's forwarding entry points at, if programmed.
    pub fn route_handle(&self, key: &RouteKey) -> Option<ForwardingHandle> {
        self.routes.get(key).and_then(|r| r.handle)
    }

    pub fn route_group(&self, key: &RouteKey) -> Option<&GroupId> {
        self.routes.get(key).map(|r| &r.group)
    }

    /// Routes bound to `id`.
    pub fn routes_of(&self, id: &GroupId) -> impl Iterator<Item = &RouteKey> {
        self.by_group.get(id).into_iter().flatten()
    }

    pub fn routes(&self) -> impl Iterator<Item = (&RouteKey, &GroupId)> {
        self.routes.iter().map(|(key, bound)| (key, &bound.group))
    }

    /// Binds `key` to `target` and programs its forwarding entry.
    ///
    /// A group name resolves to a named group first, then to a class-based
    /// one. Inline next hops share the route-owned group of their member set.
    pub fn bind(
        &mut self,
        key: RouteKey,
        target: RouteTarget,
        store: &mut NextHopGroupStore,
        resolver: &mut NextHopResolver,
    ) -> Result<()> {
        let id = match target {
            RouteTarget::Group(name) => {
                let named = GroupId::Named(name.clone());
                let class_based = GroupId::ClassBased(name.clone());
                if store.contains(&named) {
                    named
                } else if store.contains(&class_based) {
                    class_based
                } else {
                    debug!("RouteBinder: route {} waits for group {}", key, name);
                    return Err(NhgError::UnresolvedReference {
                        missing: vec![name],
                    });
                }
            }
            RouteTarget::Inline(requested) => {
                let id = GroupId::RouteOwned(NextHopGroupKey::from_members(&requested));
                if !store.contains(&id) {
                    store.create_ecmp(id.clone(), requested, resolver)?;
                }
                id
            }
        };

        let old = self.routes.get(&key).cloned();
        let new_handle = store.handle(&id);

        if let Some(bound) = old.as_ref().filter(|b| b.group == id) {
            self.program(&key, bound.handle, new_handle)?;
            if let Some(bound) = self.routes.get_mut(&key) {
                bound.handle = new_handle;
            }
            return Ok(());
        }

        store.acquire(&id)?;
        if let Err(e) = self.program(&key, old.as_ref().and_then(|b| b.handle), new_handle) {
            if let Err(release_err) = store.release(&id, resolver) {
                warn!("RouteBinder: failed to release {}: {}", id, release_err);
            }
            return Err(e);
        }

        self.routes.insert(
            key.clone(),
            BoundRoute {
                group: id.clone(),
                handle: new_handle,
            },
        );
        self.by_group.entry(id.clone()).or_default().insert(key.clone());

        if let Some(old) = old {
            self.forget(&old.group, &key);
            if let Err(e) = store.release(&old.group, resolver) {
                warn!("RouteBinder: failed to release {}: {}", old.group, e);
            }
        }

        info!("RouteBinder: bound route {} to {} ({:?})", key, id, new_handle);
        Ok(())
    }

    /// Withdraws the forwarding entry of `key` and drops its reference.
    ///
    /// Returns the group the route was bound to.
    pub fn unbind(
        &mut self,
        key: &RouteKey,
        store: &mut NextHopGroupStore,
        resolver: &mut NextHopResolver,
    ) -> Result<Option<GroupId>> {
        let Some(bound) = self.routes.get(key).cloned() else {
            debug!("RouteBinder: route {} is not bound", key);
            return Ok(None);
        };

        self.program(key, bound.handle, None)?;
        self.routes.remove(key);
        self.forget(&bound.group, key);
        if let Err(e) = store.release(&bound.group, resolver) {
            warn!("RouteBinder: failed to release {}: {}", bound.group, e);
        }

        info!("RouteBinder: unbound route {} from {}", key, bound.group);
        Ok(Some(bound.group))
    }

    /// Repoints every route bound to the group named in `change`.
    pub fn on_handle_change(&mut self, change: &HandleChange) {
        let keys: Vec<RouteKey> = self.routes_of(&change.id).cloned().collect();
        for key in keys {
            let Some(old) = self.routes.get(&key).map(|r| r.handle) else {
                continue;
            };
            match self.program(&key, old, change.handle) {
                Ok(()) => {
                    if let Some(bound) = self.routes.get_mut(&key) {
                        bound.handle = change.handle;
                    }
                }
                Err(e) => warn!(
                    "RouteBinder: failed to repoint route {} for {}: {}",
                    key, change.id, e
                ),
            }
        }
    }

    /// Reprograms routes whose forwarding entry lags behind their group's
    /// handle after a failed repoint.
    pub fn resync(&mut self, store: &NextHopGroupStore) {
        let stale: BTreeSet<GroupId> = self
            .routes
            .values()
            .filter(|bound| bound.handle != store.handle(&bound.group))
            .map(|bound| bound.group.clone())
            .collect();
        for id in stale {
            debug!("RouteBinder: resyncing routes of {}", id);
            let handle = store.handle(&id);
            self.on_handle_change(&HandleChange { id, handle });
        }
    }

    fn forget(&mut self, id: &GroupId, key: &RouteKey) {
        if let Some(keys) = self.by_group.get_mut(id) {
            keys.remove(key);
            if keys.is_empty() {
                self.by_group.remove(id);
            }
        }
    }

    /// Writes the forwarding entry of `key` when its handle changes.
    fn program(
        &mut self,
        key: &RouteKey,
        old: Option<ForwardingHandle>,
        new: Option<ForwardingHandle>,
    ) -> Result<()> {
        let entry = key.to_entry();
        let result = match (old, new) {
            (old, Some(new)) if old != Some(new) => self
                .sai
                .set_route(&entry, new.as_raw())
                .map(|()| self.stats.routes_programmed += 1),
            (Some(_), None) => self
                .sai
                .remove_route(&entry)
                .map(|()| self.stats.routes_withdrawn += 1),
            _ => return Ok(()),
        };

        result.map_err(|e| {
            self.stats.programming_failures += 1;
            error!("RouteBinder: failed to program route {}: {}", key, e);
            audit_log!(AuditRecord::new(
                AuditCategory::SaiOperation,
                "RouteBinder",
                "program_route"
            )
            .with_object_id(key.to_string())
            .with_object_type("route")
            .with_error(e.to_string()));
            NhgError::from(e)
        })
    }
}
