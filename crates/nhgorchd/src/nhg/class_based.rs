//! Hardware side of class-based groups.
//!
//! A class-based group owns one hardware member per position whose member
//! group currently has a handle. Positions are the member indices the class
//! map refers to.

use super::store::{remove_members, NextHopGroupStore};
use super::types::{CbfSlot, ForwardingHandle, GroupEntry, GroupId, GroupKind, GroupState, HandleChange};
use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::audit_log;
use crate::cbf::ClassMap;
use crate::error::{NhgError, Result};
use log::{debug, info, warn};
use sonic_sai::{GroupMemberSpec, NextHopGroupApi, NextHopGroupOid, NextHopGroupType, SaiError};
use std::sync::Arc;

fn slot_spec(handle: ForwardingHandle, position: usize) -> GroupMemberSpec {
    GroupMemberSpec {
        next_hop: handle.as_raw(),
        weight: 1,
        index: Some(position as u32),
    }
}

/// Creates a class-based group with a member for every slot that has a
/// handle, or nothing.
pub(super) fn create_class_based_hw(
    sai: &dyn NextHopGroupApi,
    class_map: &ClassMap,
    slots: &[CbfSlot],
) -> std::result::Result<(NextHopGroupOid, Vec<CbfSlot>), SaiError> {
    let oid = sai.create_next_hop_group(NextHopGroupType::ClassBased, Some(class_map.as_map()))?;

    let mut created: Vec<CbfSlot> = Vec::with_capacity(slots.len());
    for (position, slot) in slots.iter().enumerate() {
        let member = match slot.handle {
            Some(handle) => match sai.create_group_member(oid, &slot_spec(handle, position)) {
                Ok(member) => Some(member),
                Err(e) => {
                    remove_members(sai, created.iter().filter_map(|s| s.member));
                    if let Err(e) = sai.remove_next_hop_group(oid) {
                        warn!("NextHopGroupStore: rollback of group {} failed: {}", oid, e);
                    }
                    return Err(e);
                }
            },
            None => None,
        };
        created.push(CbfSlot {
            handle: slot.handle,
            member,
        });
    }

    Ok((oid, created))
}

impl NextHopGroupStore {
    /// Adds a class-based group. Without a free slot the group waits in the
    /// capacity queue with no handle.
    pub fn insert_class_based(
        &mut self,
        name: &str,
        members: Vec<String>,
        class_map: ClassMap,
        handles: Vec<Option<ForwardingHandle>>,
    ) -> Result<Vec<HandleChange>> {
        let id = GroupId::ClassBased(name.to_string());
        let slots: Vec<CbfSlot> = handles
            .into_iter()
            .map(|handle| CbfSlot {
                handle,
                member: None,
            })
            .collect();

        let created = if self.pool.has_free() {
            match create_class_based_hw(self.sai.as_ref(), &class_map, &slots) {
                Ok(created) => Some(created),
                Err(e) if e.is_capacity_exhausted() => {
                    warn!(
                        "NextHopGroupStore: switch has no room for group {}: {}",
                        id, e
                    );
                    None
                }
                Err(e) => {
                    self.hardware_failure(&id, "create_group", &e);
                    return Err(e.into());
                }
            }
        } else {
            None
        };

        let member_count = members.len();
        let mut entry = GroupEntry::new(
            id.clone(),
            GroupKind::ClassBased {
                members,
                class_map,
                slots,
            },
        );
        match created {
            Some((oid, created_slots)) => {
                self.pool.allocate();
                self.stats.groups_created += 1;
                if let GroupKind::ClassBased { slots, .. } = &mut entry.kind {
                    *slots = created_slots;
                }
                entry.state = GroupState::Synced { oid };
            }
            None => {
                self.pool.enqueue(id.clone());
                self.stats.pending_enqueued += 1;
                entry.state = GroupState::Pending { stand_in: None };
            }
        }

        let status = entry.state.status();
        let handle = entry.handle();
        self.groups.insert(id.clone(), entry);

        info!("NextHopGroupStore: created group {} ({})", id, status);
        audit_log!(AuditRecord::new(
            AuditCategory::ResourceCreate,
            "NextHopGroupStore",
            "create_group"
        )
        .with_outcome(AuditOutcome::Success)
        .with_object_id(id.to_string())
        .with_object_type("class_based_next_hop_group")
        .with_details(serde_json::json!({
            "member_count": member_count,
            "state": status.to_string(),
        })));

        Ok(vec![HandleChange { id, handle }])
    }

    /// Updates the members and class map of a class-based group.
    ///
    /// Positions whose member group is unchanged keep their hardware member;
    /// new positions are added before the class map changes and replaced
    /// positions are removed last.
    pub fn update_class_based(
        &mut self,
        name: &str,
        members: Vec<String>,
        class_map: ClassMap,
        handles: Vec<Option<ForwardingHandle>>,
    ) -> Result<Vec<HandleChange>> {
        let id = GroupId::ClassBased(name.to_string());
        let entry = self
            .groups
            .get(&id)
            .ok_or_else(|| NhgError::GroupNotFound(id.to_string()))?;
        let GroupKind::ClassBased {
            members: old_members,
            class_map: old_map,
            slots: old_slots,
        } = &entry.kind
        else {
            return Err(NhgError::GroupNotFound(id.to_string()));
        };
        let old_members = old_members.clone();
        let old_map = old_map.clone();
        let old_slots = old_slots.clone();

        let slots = match entry.state {
            GroupState::Synced { oid } => self.update_class_based_hw(
                &id,
                oid,
                (&old_members, &old_map, &old_slots),
                (&members, &class_map, &handles),
            )?,
            _ => handles
                .iter()
                .map(|&handle| CbfSlot {
                    handle,
                    member: None,
                })
                .collect(),
        };

        let member_count = members.len();
        if let Some(entry) = self.groups.get_mut(&id) {
            entry.kind = GroupKind::ClassBased {
                members,
                class_map,
                slots,
            };
        }

        debug!(
            "NextHopGroupStore: updated group {} to {} members",
            id, member_count
        );
        audit_log!(AuditRecord::new(
            AuditCategory::ResourceModify,
            "NextHopGroupStore",
            "update_group"
        )
        .with_outcome(AuditOutcome::Success)
        .with_object_id(id.to_string())
        .with_object_type("class_based_next_hop_group")
        .with_details(serde_json::json!({ "member_count": member_count })));

        Ok(Vec::new())
    }

    fn update_class_based_hw(
        &mut self,
        id: &GroupId,
        oid: NextHopGroupOid,
        old: (&[String], &ClassMap, &[CbfSlot]),
        new: (&[String], &ClassMap, &[Option<ForwardingHandle>]),
    ) -> Result<Vec<CbfSlot>> {
        let sai = Arc::clone(&self.sai);
        let (old_members, old_map, old_slots) = old;
        let (members, class_map, handles) = new;
        let kept = |position: usize| {
            old_members.get(position).is_some() && old_members.get(position) == members.get(position)
        };

        let mut slots = Vec::with_capacity(members.len());
        let mut created = Vec::new();
        for position in 0..members.len() {
            if kept(position) {
                slots.push(old_slots.get(position).copied().unwrap_or_default());
                continue;
            }
            let handle = handles.get(position).copied().flatten();
            let member = match handle {
                Some(h) => match sai.create_group_member(oid, &slot_spec(h, position)) {
                    Ok(member) => {
                        created.push(member);
                        Some(member)
                    }
                    Err(e) => {
                        remove_members(sai.as_ref(), created.into_iter());
                        self.hardware_failure(id, "add_group_member", &e);
                        return Err(e.into());
                    }
                },
                None => None,
            };
            slots.push(CbfSlot { handle, member });
        }

        if class_map != old_map {
            if let Err(e) = sai.set_class_map(oid, class_map.as_map()) {
                remove_members(sai.as_ref(), created.into_iter());
                self.hardware_failure(id, "set_class_map", &e);
                return Err(e.into());
            }
        }

        let replaced = old_slots
            .iter()
            .enumerate()
            .filter(|(position, _)| !kept(*position))
            .filter_map(|(_, slot)| slot.member);
        remove_members(sai.as_ref(), replaced);

        Ok(slots)
    }

    /// Repoints one position of a class-based group at a member group's new
    /// handle.
    pub fn set_class_based_member_handle(
        &mut self,
        id: &GroupId,
        position: usize,
        handle: Option<ForwardingHandle>,
    ) -> Result<()> {
        let sai = Arc::clone(&self.sai);
        let entry = self
            .groups
            .get_mut(id)
            .ok_or_else(|| NhgError::GroupNotFound(id.to_string()))?;
        let oid = match entry.state {
            GroupState::Synced { oid } => Some(oid),
            _ => None,
        };
        let GroupKind::ClassBased { slots, .. } = &mut entry.kind else {
            return Ok(());
        };
        let Some(slot) = slots.get_mut(position) else {
            return Ok(());
        };
        if slot.handle == handle {
            return Ok(());
        }

        if let Some(oid) = oid {
            match (slot.member, handle) {
                (Some(member), Some(h)) => sai.set_member_next_hop(member, h.as_raw())?,
                (Some(member), None) => {
                    sai.remove_group_member(member)?;
                    slot.member = None;
                }
                (None, Some(h)) => {
                    slot.member = Some(sai.create_group_member(oid, &slot_spec(h, position))?);
                }
                (None, None) => {}
            }
        }
        slot.handle = handle;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nexthop::NextHopResolver;
    use crate::nhg::{parse_members, GroupStatus};
    use pretty_assertions::assert_eq;
    use sonic_sai::{NextHopSpec, SaiStatus, VirtualOp, VirtualSwitch};
    use sonic_types::LabelStack;

    fn setup(capacity: u32) -> (Arc<VirtualSwitch>, NextHopResolver, NextHopGroupStore) {
        let switch = Arc::new(VirtualSwitch::new(capacity));
        let mut resolver = NextHopResolver::new(switch.clone());
        for (ip, alias) in [("10.0.0.1", "Ethernet0"), ("10.0.0.3", "Ethernet4")] {
            let oid = switch.register_next_hop(NextHopSpec {
                ip: ip.parse().unwrap(),
                alias: alias.to_string(),
                labels: LabelStack::default(),
            });
            resolver.on_neighbor(ip.parse().unwrap(), alias, Some(oid));
        }
        let mut store = NextHopGroupStore::new(switch.clone(), capacity as usize);
        for (name, ip, alias) in [("nhg1", "10.0.0.1", "Ethernet0"), ("nhg2", "10.0.0.3", "Ethernet4")] {
            let members = parse_members(Some(ip), Some(alias), None).unwrap();
            store.configure_named(name, members, &mut resolver).unwrap();
        }
        (switch, resolver, store)
    }

    fn handles(store: &NextHopGroupStore, names: &[&str]) -> Vec<Option<ForwardingHandle>> {
        names
            .iter()
            .map(|n| store.handle(&GroupId::Named(n.to_string())))
            .collect()
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_insert_creates_member_per_position() {
        let (switch, _resolver, mut store) = setup(4);
        let map = ClassMap::parse("0:0,1:1", 2).unwrap();
        store
            .insert_class_based("cbf1", names(&["nhg1", "nhg2"]), map.clone(), handles(&store, &["nhg1", "nhg2"]))
            .unwrap();

        let id = GroupId::ClassBased("cbf1".to_string());
        assert_eq!(store.status(&id), Some(GroupStatus::Synced));
        let Some(ForwardingHandle::Group(oid)) = store.handle(&id) else {
            panic!("expected a hardware group");
        };
        let indices: Vec<Option<u32>> = switch.group_members(oid).iter().map(|m| m.index).collect();
        assert_eq!(indices, vec![Some(0), Some(1)]);
        assert_eq!(switch.class_map(oid).as_ref(), Some(map.as_map()));
    }

    #[test]
    fn test_insert_without_capacity_is_pending_without_handle() {
        let (_switch, _resolver, mut store) = setup(0);
        let map = ClassMap::parse("0:0", 1).unwrap();
        let changes = store
            .insert_class_based("cbf1", names(&["nhg1"]), map, handles(&store, &["nhg1"]))
            .unwrap();

        let id = GroupId::ClassBased("cbf1".to_string());
        assert_eq!(store.status(&id), Some(GroupStatus::Pending));
        assert_eq!(changes, vec![HandleChange { id, handle: None }]);
    }

    #[test]
    fn test_class_map_only_update_keeps_members() {
        let (switch, _resolver, mut store) = setup(4);
        let members = names(&["nhg1", "nhg2"]);
        store
            .insert_class_based("cbf1", members.clone(), ClassMap::parse("0:0,1:1", 2).unwrap(), handles(&store, &["nhg1", "nhg2"]))
            .unwrap();
        let id = GroupId::ClassBased("cbf1".to_string());
        let Some(ForwardingHandle::Group(oid)) = store.handle(&id) else {
            panic!("expected a hardware group");
        };
        let before = switch.group_members(oid);

        let map = ClassMap::parse("0:1,1:0", 2).unwrap();
        store
            .update_class_based("cbf1", members, map.clone(), handles(&store, &["nhg1", "nhg2"]))
            .unwrap();

        assert_eq!(switch.group_members(oid), before);
        assert_eq!(switch.class_map(oid).as_ref(), Some(map.as_map()));
    }

    #[test]
    fn test_failed_class_map_update_keeps_prior_state() {
        let (switch, _resolver, mut store) = setup(4);
        let map = ClassMap::parse("0:0", 1).unwrap();
        store
            .insert_class_based("cbf1", names(&["nhg1"]), map.clone(), handles(&store, &["nhg1"]))
            .unwrap();
        let members_before = switch.member_count();

        switch.inject_failure(VirtualOp::SetClassMap, SaiStatus::Failure);
        let result = store.update_class_based(
            "cbf1",
            names(&["nhg1", "nhg2"]),
            ClassMap::parse("0:0,1:1", 2).unwrap(),
            handles(&store, &["nhg1", "nhg2"]),
        );

        assert!(matches!(result, Err(NhgError::Hardware(_))));
        assert_eq!(switch.member_count(), members_before);
        let entry = store.get(&GroupId::ClassBased("cbf1".to_string())).unwrap();
        let GroupKind::ClassBased { class_map, members, .. } = &entry.kind else {
            panic!("expected a class-based group");
        };
        assert_eq!(class_map, &map);
        assert_eq!(members, &names(&["nhg1"]));
    }

    #[test]
    fn test_member_handle_change_repoints_position() {
        let (switch, _resolver, mut store) = setup(4);
        store
            .insert_class_based("cbf1", names(&["nhg1"]), ClassMap::parse("0:0", 1).unwrap(), vec![None])
            .unwrap();
        assert_eq!(switch.member_count(), 0);

        let id = GroupId::ClassBased("cbf1".to_string());
        let handle = store.handle(&GroupId::Named("nhg1".to_string()));
        store.set_class_based_member_handle(&id, 0, handle).unwrap();
        assert_eq!(switch.member_count(), 1);

        store.set_class_based_member_handle(&id, 0, None).unwrap();
        assert_eq!(switch.member_count(), 0);
    }
}
