//! Reference-counted next-hop group table.

use super::capacity::CapacityPool;
use super::class_based::create_class_based_hw;
use super::normalize::{usable_members, ActiveMember, RequestedMember};
use super::types::{
    EcmpMember, ForwardingHandle, GroupEntry, GroupId, GroupKind, GroupState, GroupStatus,
    HandleChange, StandIn,
};
use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::audit_log;
use crate::error::{NhgError, Result};
use crate::nexthop::{NextHopKey, NextHopResolver};
use log::{debug, error, info, warn};
use sonic_orch_common::SyncMap;
use sonic_sai::{
    GroupMemberSpec, NextHopGroupApi, NextHopGroupMemberOid, NextHopGroupOid, NextHopGroupType,
    SaiError,
};
use std::sync::Arc;

/// Group table counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Hardware groups created, including promotions
    pub groups_created: u64,
    /// Hardware groups removed
    pub groups_removed: u64,
    pub promotions: u64,
    pub pending_enqueued: u64,
    pub rejected_deletes: u64,
    pub rejected_resizes: u64,
    pub hardware_failures: u64,
}

/// Hardware group whose removal waits until referrers have moved away.
#[derive(Debug)]
struct RetiredGroup {
    oid: NextHopGroupOid,
    members: Vec<NextHopGroupMemberOid>,
}

/// Table of every named, class-based and route-owned group.
///
/// Each entry carries its reference count explicitly; routes and
/// class-based groups bind through [`acquire`](Self::acquire) and
/// [`release`](Self::release). A route-owned group disappears with its last
/// reference, named and class-based groups only on an explicit delete.
///
/// Operations that change what referrers should point at return
/// [`HandleChange`]s. Hardware groups that stop being used are retired and
/// only removed by [`flush_retired`](Self::flush_retired), after the caller
/// has repointed the referrers.
pub struct NextHopGroupStore {
    pub(super) sai: Arc<dyn NextHopGroupApi>,
    pub(super) groups: SyncMap<GroupId, GroupEntry>,
    pub(super) pool: CapacityPool,
    retired: Vec<RetiredGroup>,
    pub(super) stats: StoreStats,
}

impl NextHopGroupStore {
    pub fn new(sai: Arc<dyn NextHopGroupApi>, capacity: usize) -> Self {
        Self {
            sai,
            groups: SyncMap::new(),
            pool: CapacityPool::new(capacity),
            retired: Vec::new(),
            stats: StoreStats::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn contains(&self, id: &GroupId) -> bool {
        self.groups.contains_key(id)
    }

    pub fn get(&self, id: &GroupId) -> Option<&GroupEntry> {
        self.groups.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GroupEntry> {
        self.groups.values()
    }

    pub fn status(&self, id: &GroupId) -> Option<GroupStatus> {
        self.groups.get(id).map(|e| e.state.status())
    }

    pub fn handle(&self, id: &GroupId) -> Option<ForwardingHandle> {
        self.groups.get(id).and_then(|e| e.handle())
    }

    pub fn ref_count(&self, id: &GroupId) -> Option<u32> {
        self.groups.ref_count(id)
    }

    pub fn pool(&self) -> &CapacityPool {
        &self.pool
    }

    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }

    /// Adds a referrer to an existing group.
    pub fn acquire(&mut self, id: &GroupId) -> Result<u32> {
        if !self.groups.contains_key(id) {
            return Err(NhgError::GroupNotFound(id.to_string()));
        }
        Ok(self.groups.increment_ref(id)?)
    }

    /// Drops a referrer. A route-owned group is removed with its last one.
    pub fn release(&mut self, id: &GroupId, resolver: &mut NextHopResolver) -> Result<u32> {
        let count = self.groups.decrement_ref(id)?;
        if count == 0 && matches!(id, GroupId::RouteOwned(_)) {
            self.remove_entry(id, resolver);
        }
        Ok(count)
    }

    /// Creates an ECMP group entry and syncs it as far as reachability and
    /// capacity allow.
    pub fn create_ecmp(
        &mut self,
        id: GroupId,
        requested: Vec<RequestedMember>,
        resolver: &mut NextHopResolver,
    ) -> Result<Vec<HandleChange>> {
        for member in &requested {
            resolver.acquire(&member.key);
        }
        let member_count = requested.len();
        self.groups.insert(
            id.clone(),
            GroupEntry::new(
                id.clone(),
                GroupKind::Ecmp {
                    requested,
                    members: Vec::new(),
                },
            ),
        );

        match self.converge(&id, resolver) {
            Ok(changes) => {
                let status = self.status(&id).unwrap_or(GroupStatus::Unresolved);
                info!("NextHopGroupStore: created group {} ({})", id, status);
                audit_log!(AuditRecord::new(
                    AuditCategory::ResourceCreate,
                    "NextHopGroupStore",
                    "create_group"
                )
                .with_outcome(AuditOutcome::Success)
                .with_object_id(id.to_string())
                .with_object_type("next_hop_group")
                .with_details(serde_json::json!({
                    "member_count": member_count,
                    "state": status.to_string(),
                })));
                Ok(changes)
            }
            Err(e) => {
                if let Some(entry) = self.groups.remove(&id) {
                    release_requested(&entry, resolver);
                }
                Err(e)
            }
        }
    }

    /// Creates or updates a named group from a NEXT_HOP_GROUP_TABLE entry.
    ///
    /// A referenced group may not move between one usable member and
    /// several: a synced group cannot shrink below two reachable members,
    /// and a single next-hop group cannot grow into a hardware group. The
    /// name must not already belong to a class-based group.
    pub fn configure_named(
        &mut self,
        name: &str,
        requested: Vec<RequestedMember>,
        resolver: &mut NextHopResolver,
    ) -> Result<Vec<HandleChange>> {
        let id = GroupId::Named(name.to_string());
        let Some(entry) = self.groups.get(&id) else {
            if self.groups.contains_key(&GroupId::ClassBased(name.to_string())) {
                return Err(NhgError::malformed(format!(
                    "{} is already a class-based group",
                    name
                )));
            }
            return self.create_ecmp(id, requested, resolver);
        };

        let old_requested = entry.kind.requested().map(<[_]>::to_vec).unwrap_or_default();
        if old_requested == requested {
            return self.converge(&id, resolver);
        }

        let state = entry.state.clone();
        let ref_count = entry.ref_count;
        let before = usable_members(&old_requested, resolver).len();
        for member in &requested {
            resolver.acquire(&member.key);
        }

        let usable = usable_members(&requested, resolver).len();
        let shrinking = state.is_synced() && usable < 2;
        let growing = matches!(state, GroupState::SingleNh { .. })
            && old_requested.len() < 2
            && usable >= 2;
        if ref_count > 0 && (shrinking || growing) {
            for member in &requested {
                resolver.release(&member.key);
            }
            let err = NhgError::ReferencedResize {
                group: name.to_string(),
                ref_count,
                from: before,
                to: usable,
            };
            self.stats.rejected_resizes += 1;
            warn!("NextHopGroupStore: {}", err);
            audit_log!(AuditRecord::new(
                AuditCategory::ResourceModify,
                "NextHopGroupStore",
                "update_group"
            )
            .with_outcome(AuditOutcome::Denied)
            .with_object_id(id.to_string())
            .with_object_type("next_hop_group")
            .with_details(serde_json::json!({
                "ref_count": ref_count,
                "from": before,
                "to": usable,
            })));
            return Err(err);
        }

        self.set_requested(&id, requested.clone());

        match self.converge(&id, resolver) {
            Ok(changes) => {
                for member in &old_requested {
                    resolver.release(&member.key);
                }
                debug!(
                    "NextHopGroupStore: updated group {} to {} members",
                    id,
                    requested.len()
                );
                audit_log!(AuditRecord::new(
                    AuditCategory::ResourceModify,
                    "NextHopGroupStore",
                    "update_group"
                )
                .with_outcome(AuditOutcome::Success)
                .with_object_id(id.to_string())
                .with_object_type("next_hop_group")
                .with_details(serde_json::json!({
                    "member_count": requested.len(),
                })));
                Ok(changes)
            }
            Err(e) => {
                self.set_requested(&id, old_requested);
                for member in &requested {
                    resolver.release(&member.key);
                }
                Err(e)
            }
        }
    }

    /// Deletes an unreferenced named or class-based group.
    ///
    /// Returns the removed entry so that the caller can drop whatever the
    /// group itself referenced.
    pub fn remove(&mut self, id: &GroupId, resolver: &mut NextHopResolver) -> Result<GroupEntry> {
        let entry = self
            .groups
            .get(id)
            .ok_or_else(|| NhgError::GroupNotFound(id.to_string()))?;

        if entry.ref_count > 0 {
            let err = NhgError::ReferencedDelete {
                group: id.name().map(str::to_string).unwrap_or_else(|| id.to_string()),
                ref_count: entry.ref_count,
            };
            self.stats.rejected_deletes += 1;
            info!("NextHopGroupStore: {}", err);
            audit_log!(AuditRecord::new(
                AuditCategory::ResourceDelete,
                "NextHopGroupStore",
                "remove_group"
            )
            .with_outcome(AuditOutcome::Denied)
            .with_object_id(id.to_string())
            .with_object_type("next_hop_group")
            .with_details(serde_json::json!({ "ref_count": entry.ref_count })));
            return Err(err);
        }

        self.remove_entry(id, resolver)
            .ok_or_else(|| NhgError::GroupNotFound(id.to_string()))
    }

    fn remove_entry(&mut self, id: &GroupId, resolver: &mut NextHopResolver) -> Option<GroupEntry> {
        let entry = self.groups.remove(id)?;
        match &entry.state {
            GroupState::Synced { oid } => {
                self.retire(*oid, hardware_members(&entry.kind));
            }
            GroupState::Pending { .. } => {
                self.pool.dequeue(id);
            }
            GroupState::Unresolved | GroupState::SingleNh { .. } => {}
        }
        release_requested(&entry, resolver);

        info!("NextHopGroupStore: removed group {}", id);
        audit_log!(AuditRecord::new(
            AuditCategory::ResourceDelete,
            "NextHopGroupStore",
            "remove_group"
        )
        .with_outcome(AuditOutcome::Success)
        .with_object_id(id.to_string())
        .with_object_type("next_hop_group")
        .with_details(serde_json::json!({ "state": entry.state.status().to_string() })));
        Some(entry)
    }

    fn set_requested(&mut self, id: &GroupId, new: Vec<RequestedMember>) {
        if let Some(GroupKind::Ecmp { requested, .. }) = self.groups.get_mut(id).map(|e| &mut e.kind)
        {
            *requested = new;
        }
    }

    /// Brings an ECMP group in line with the current reachability of its
    /// requested members.
    ///
    /// A synced group is updated in place while it keeps at least two
    /// usable members. On a hardware error the group is left as it was.
    pub fn converge(
        &mut self,
        id: &GroupId,
        resolver: &NextHopResolver,
    ) -> Result<Vec<HandleChange>> {
        let entry = self
            .groups
            .get(id)
            .ok_or_else(|| NhgError::GroupNotFound(id.to_string()))?;
        let GroupKind::Ecmp { requested, members } = &entry.kind else {
            return Ok(Vec::new());
        };
        let usable = usable_members(requested, resolver);
        let current = members.clone();
        let state = entry.state.clone();
        let old_handle = entry.handle();

        let (new_state, new_members) = match state {
            GroupState::Synced { oid } if usable.len() >= 2 => {
                let members = self.sync_members(id, oid, &current, &usable)?;
                (GroupState::Synced { oid }, members)
            }
            GroupState::Synced { oid } => {
                info!(
                    "NextHopGroupStore: group {} has {} usable members, releasing hardware group {}",
                    id,
                    usable.len(),
                    oid
                );
                self.retire(oid, current.iter().map(|m| m.member_oid).collect());
                (fallback_state(&usable), Vec::new())
            }
            GroupState::Pending { stand_in } if usable.len() >= 2 => {
                let stand_in = stand_in
                    .filter(|s| usable.iter().any(|m| m.key == s.key && m.handle == s.handle))
                    .unwrap_or_else(|| stand_in_for(&usable));
                (
                    GroupState::Pending {
                        stand_in: Some(stand_in),
                    },
                    Vec::new(),
                )
            }
            GroupState::Pending { .. } => {
                self.pool.dequeue(id);
                (fallback_state(&usable), Vec::new())
            }
            GroupState::Unresolved | GroupState::SingleNh { .. } if usable.len() >= 2 => {
                self.allocate_ecmp(id, &usable)?
            }
            GroupState::Unresolved | GroupState::SingleNh { .. } => {
                (fallback_state(&usable), Vec::new())
            }
        };

        let Some(entry) = self.groups.get_mut(id) else {
            return Ok(Vec::new());
        };
        entry.state = new_state;
        if let GroupKind::Ecmp { members, .. } = &mut entry.kind {
            *members = new_members;
        }

        let new_handle = entry.handle();
        if new_handle == old_handle {
            return Ok(Vec::new());
        }
        debug!(
            "NextHopGroupStore: group {} is now {} ({:?})",
            id,
            entry.state.status(),
            new_handle
        );
        Ok(vec![HandleChange {
            id: id.clone(),
            handle: new_handle,
        }])
    }

    fn allocate_ecmp(
        &mut self,
        id: &GroupId,
        usable: &[ActiveMember],
    ) -> Result<(GroupState, Vec<EcmpMember>)> {
        if !self.pool.has_free() {
            return Ok(self.defer(id, usable));
        }

        match create_ecmp_hw(self.sai.as_ref(), usable) {
            Ok((oid, members)) => {
                self.pool.allocate();
                self.stats.groups_created += 1;
                debug!(
                    "NextHopGroupStore: synced group {} as {} with {} members",
                    id,
                    oid,
                    members.len()
                );
                Ok((GroupState::Synced { oid }, members))
            }
            Err(e) if e.is_capacity_exhausted() => {
                warn!(
                    "NextHopGroupStore: switch has no room for group {}: {}",
                    id, e
                );
                Ok(self.defer(id, usable))
            }
            Err(e) => {
                self.hardware_failure(id, "create_group", &e);
                Err(e.into())
            }
        }
    }

    fn defer(&mut self, id: &GroupId, usable: &[ActiveMember]) -> (GroupState, Vec<EcmpMember>) {
        self.pool.enqueue(id.clone());
        self.stats.pending_enqueued += 1;
        info!(
            "NextHopGroupStore: group {} is pending ({} waiting)",
            id,
            self.pool.pending_len()
        );
        (
            GroupState::Pending {
                stand_in: Some(stand_in_for(usable)),
            },
            Vec::new(),
        )
    }

    /// Applies a member delta to a synced group: additions first, then
    /// weight changes, both rolled back as a whole on failure, then removals.
    /// A member whose removal fails is kept and retried on the next pass.
    fn sync_members(
        &mut self,
        id: &GroupId,
        oid: NextHopGroupOid,
        current: &[EcmpMember],
        usable: &[ActiveMember],
    ) -> Result<Vec<EcmpMember>> {
        let sai = Arc::clone(&self.sai);
        let is_current =
            |m: &ActiveMember| current.iter().any(|c| c.key == m.key && c.handle == m.handle);

        let mut added: Vec<EcmpMember> = Vec::new();
        for member in usable.iter().filter(|m| !is_current(m)) {
            match sai.create_group_member(oid, &member_spec(member)) {
                Ok(member_oid) => added.push(EcmpMember {
                    key: member.key.clone(),
                    weight: member.weight,
                    handle: member.handle,
                    member_oid,
                }),
                Err(e) => {
                    remove_members(sai.as_ref(), added.iter().map(|m| m.member_oid));
                    self.hardware_failure(id, "add_group_member", &e);
                    return Err(e.into());
                }
            }
        }

        let mut result: Vec<EcmpMember> = Vec::with_capacity(usable.len());
        let mut reweighted: Vec<&EcmpMember> = Vec::new();
        for member in usable {
            let existing = current
                .iter()
                .find(|c| c.key == member.key && c.handle == member.handle);
            if let Some(existing) = existing {
                let mut kept = existing.clone();
                if kept.weight != member.weight {
                    if let Err(e) = sai.set_member_weight(kept.member_oid, member.weight) {
                        for prior in reweighted {
                            if let Err(e) = sai.set_member_weight(prior.member_oid, prior.weight) {
                                warn!(
                                    "NextHopGroupStore: failed to restore weight of {} in {}: {}",
                                    prior.key, id, e
                                );
                            }
                        }
                        remove_members(sai.as_ref(), added.iter().map(|m| m.member_oid));
                        self.hardware_failure(id, "set_member_weight", &e);
                        return Err(e.into());
                    }
                    kept.weight = member.weight;
                    reweighted.push(existing);
                }
                result.push(kept);
            } else if let Some(new) = added.iter().find(|a| a.key == member.key) {
                result.push(new.clone());
            }
        }

        let stale: Vec<EcmpMember> = current
            .iter()
            .filter(|c| !result.iter().any(|r| r.member_oid == c.member_oid))
            .cloned()
            .collect();
        for member in stale {
            if let Err(e) = sai.remove_group_member(member.member_oid) {
                // Kept so that the next convergence retries the removal
                warn!(
                    "NextHopGroupStore: failed to remove {} from {}: {}",
                    member.key, id, e
                );
                result.push(member);
            }
        }

        Ok(result)
    }

    /// Re-evaluates every ECMP group that uses one of `keys`.
    pub fn repair(&mut self, keys: &[NextHopKey], resolver: &NextHopResolver) -> Vec<HandleChange> {
        if keys.is_empty() {
            return Vec::new();
        }
        let affected: Vec<GroupId> = self
            .groups
            .iter()
            .filter(|(_, e)| {
                e.kind
                    .requested()
                    .is_some_and(|r| r.iter().any(|m| keys.contains(&m.key)))
            })
            .map(|(id, _)| id.clone())
            .collect();

        let mut changes = Vec::new();
        for id in affected {
            match self.converge(&id, resolver) {
                Ok(c) => changes.extend(c),
                Err(e) => warn!("NextHopGroupStore: repair of {} failed: {}", id, e),
            }
        }
        changes
    }

    /// Gives free hardware slots to the oldest pending groups.
    ///
    /// Stops at the first group the switch refuses; a refusal for lack of
    /// room keeps the group at the head of the queue, any other refusal
    /// sends it to the back.
    pub fn promote(&mut self, resolver: &NextHopResolver) -> Vec<HandleChange> {
        let mut changes = Vec::new();

        for id in self.pool.promotions() {
            let Some(entry) = self.groups.get(&id) else {
                self.pool.dequeue(&id);
                continue;
            };

            let built = match &entry.kind {
                GroupKind::Ecmp { requested, .. } => {
                    let usable = usable_members(requested, resolver);
                    if usable.len() < 2 {
                        None
                    } else {
                        Some(create_ecmp_hw(self.sai.as_ref(), &usable).map(|(oid, members)| {
                            (
                                oid,
                                GroupKind::Ecmp {
                                    requested: requested.clone(),
                                    members,
                                },
                            )
                        }))
                    }
                }
                GroupKind::ClassBased {
                    members,
                    class_map,
                    slots,
                } => Some(
                    create_class_based_hw(self.sai.as_ref(), class_map, slots).map(
                        |(oid, slots)| {
                            (
                                oid,
                                GroupKind::ClassBased {
                                    members: members.clone(),
                                    class_map: class_map.clone(),
                                    slots,
                                },
                            )
                        },
                    ),
                ),
            };

            match built {
                None => match self.converge(&id, resolver) {
                    Ok(c) => changes.extend(c),
                    Err(e) => warn!("NextHopGroupStore: failed to settle {}: {}", id, e),
                },
                Some(Ok((oid, kind))) => {
                    self.pool.dequeue(&id);
                    self.pool.allocate();
                    self.stats.promotions += 1;
                    self.stats.groups_created += 1;
                    if let Some(entry) = self.groups.get_mut(&id) {
                        entry.kind = kind;
                        entry.state = GroupState::Synced { oid };
                    }
                    info!("NextHopGroupStore: promoted group {} to {}", id, oid);
                    audit_log!(AuditRecord::new(
                        AuditCategory::ResourceModify,
                        "NextHopGroupStore",
                        "promote_group"
                    )
                    .with_outcome(AuditOutcome::Success)
                    .with_object_id(id.to_string())
                    .with_object_type("next_hop_group")
                    .with_details(serde_json::json!({
                        "nhg_id": oid.to_string(),
                        "still_pending": self.pool.pending_len(),
                    })));
                    changes.push(HandleChange {
                        id,
                        handle: Some(ForwardingHandle::Group(oid)),
                    });
                }
                Some(Err(e)) if e.is_capacity_exhausted() => {
                    debug!("NextHopGroupStore: promotion of {} deferred: {}", id, e);
                    break;
                }
                Some(Err(e)) => {
                    self.hardware_failure(&id, "promote_group", &e);
                    self.pool.requeue_back(&id);
                    break;
                }
            }
        }

        changes
    }

    /// Queues a hardware group for removal by [`flush_retired`](Self::flush_retired).
    /// Its capacity slot stays taken until the switch has removed it.
    pub(super) fn retire(&mut self, oid: NextHopGroupOid, members: Vec<NextHopGroupMemberOid>) {
        self.retired.push(RetiredGroup { oid, members });
    }

    pub fn has_retired(&self) -> bool {
        !self.retired.is_empty()
    }

    /// Removes retired hardware groups together with their members and
    /// frees their slots.
    ///
    /// A group the switch refuses to remove, typically because a referrer
    /// could not be repointed, is kept with its remaining members and
    /// retried on the next call. A group the switch no longer knows is
    /// dropped.
    pub fn flush_retired(&mut self) {
        let sai = Arc::clone(&self.sai);
        for mut group in std::mem::take(&mut self.retired) {
            group.members.retain(|&member| match sai.remove_group_member(member) {
                Ok(()) | Err(SaiError::NotFound { .. }) => false,
                Err(e) => {
                    warn!("NextHopGroupStore: failed to remove group member {}: {}", member, e);
                    true
                }
            });
            if !group.members.is_empty() {
                self.retired.push(group);
                continue;
            }

            match sai.remove_next_hop_group(group.oid) {
                Ok(()) => {
                    self.pool.release();
                    self.stats.groups_removed += 1;
                    debug!("NextHopGroupStore: removed hardware group {}", group.oid);
                }
                Err(SaiError::NotFound { .. }) => {
                    self.pool.release();
                    warn!("NextHopGroupStore: hardware group {} already gone", group.oid);
                }
                Err(e) => {
                    error!(
                        "NextHopGroupStore: failed to remove hardware group {}, will retry: {}",
                        group.oid, e
                    );
                    self.retired.push(group);
                }
            }
        }
    }

    pub(super) fn hardware_failure(&mut self, id: &GroupId, action: &str, err: &SaiError) {
        self.stats.hardware_failures += 1;
        error!("NextHopGroupStore: {} for {} failed: {}", action, id, err);
        audit_log!(AuditRecord::new(
            AuditCategory::SaiOperation,
            "NextHopGroupStore",
            action
        )
        .with_object_id(id.to_string())
        .with_object_type("next_hop_group")
        .with_error(err.to_string()));
    }
}

fn fallback_state(usable: &[ActiveMember]) -> GroupState {
    match usable {
        [only] => GroupState::SingleNh {
            next_hop: only.key.clone(),
            handle: only.handle,
        },
        _ => GroupState::Unresolved,
    }
}

fn stand_in_for(usable: &[ActiveMember]) -> StandIn {
    StandIn {
        key: usable[0].key.clone(),
        handle: usable[0].handle,
    }
}

fn member_spec(member: &ActiveMember) -> GroupMemberSpec {
    GroupMemberSpec {
        next_hop: member.handle.as_raw(),
        weight: member.weight,
        index: None,
    }
}

fn release_requested(entry: &GroupEntry, resolver: &mut NextHopResolver) {
    if let Some(requested) = entry.kind.requested() {
        for member in requested {
            resolver.release(&member.key);
        }
    }
}

fn hardware_members(kind: &GroupKind) -> Vec<NextHopGroupMemberOid> {
    match kind {
        GroupKind::Ecmp { members, .. } => members.iter().map(|m| m.member_oid).collect(),
        GroupKind::ClassBased { slots, .. } => slots.iter().filter_map(|s| s.member).collect(),
    }
}

pub(super) fn remove_members(
    sai: &dyn NextHopGroupApi,
    members: impl Iterator<Item = NextHopGroupMemberOid>,
) {
    for member in members {
        if let Err(e) = sai.remove_group_member(member) {
            warn!("NextHopGroupStore: failed to remove group member {}: {}", member, e);
        }
    }
}

/// Creates an ECMP group with all of `usable` as members, or nothing.
fn create_ecmp_hw(
    sai: &dyn NextHopGroupApi,
    usable: &[ActiveMember],
) -> std::result::Result<(NextHopGroupOid, Vec<EcmpMember>), SaiError> {
    let oid = sai.create_next_hop_group(NextHopGroupType::Ecmp, None)?;

    let mut members = Vec::with_capacity(usable.len());
    for member in usable {
        match sai.create_group_member(oid, &member_spec(member)) {
            Ok(member_oid) => members.push(EcmpMember {
                key: member.key.clone(),
                weight: member.weight,
                handle: member.handle,
                member_oid,
            }),
            Err(e) => {
                remove_members(sai, members.iter().map(|m| m.member_oid));
                if let Err(e) = sai.remove_next_hop_group(oid) {
                    warn!("NextHopGroupStore: rollback of group {} failed: {}", oid, e);
                }
                return Err(e);
            }
        }
    }

    Ok((oid, members))
}
