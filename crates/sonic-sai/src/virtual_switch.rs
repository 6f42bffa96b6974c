//! In-memory switch implementing [`NextHopGroupApi`].
//!
//! Keeps an object table per SAI object type and enforces the constraints a
//! real ASIC enforces on next-hop group programming: the group-count
//! ceiling, no removal of objects still referenced by members or routes, and
//! members only pointing at existing objects. Failures can be injected per
//! operation to exercise error paths.

use crate::api::{GroupMemberSpec, NextHopGroupApi, NextHopGroupType, NextHopSpec, RouteEntry};
use crate::error::{SaiError, SaiResult, SaiStatus};
use crate::types::{NextHopGroupMemberOid, NextHopGroupOid, NextHopOid, RawSaiObjectId};
use log::debug;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

const NEXT_HOP_TAG: u64 = 0x4;
const GROUP_TAG: u64 = 0x5;
const MEMBER_TAG: u64 = 0x2d;

/// Operations that accept an injected failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VirtualOp {
    CreateNextHop,
    CreateGroup,
    CreateMember,
    RemoveMember,
    SetMemberWeight,
    SetMemberNextHop,
    SetClassMap,
    SetRoute,
}

#[derive(Debug, Clone)]
struct GroupObject {
    group_type: NextHopGroupType,
    class_map: Option<BTreeMap<u8, u8>>,
}

#[derive(Debug, Clone)]
struct MemberObject {
    group: RawSaiObjectId,
    spec: GroupMemberSpec,
}

#[derive(Debug, Default)]
struct SwitchState {
    next_index: u64,
    next_hops: BTreeMap<RawSaiObjectId, NextHopSpec>,
    groups: BTreeMap<RawSaiObjectId, GroupObject>,
    members: BTreeMap<RawSaiObjectId, MemberObject>,
    routes: BTreeMap<RouteEntry, RawSaiObjectId>,
    failures: HashMap<VirtualOp, SaiStatus>,
}

impl SwitchState {
    fn allocate(&mut self, tag: u64) -> RawSaiObjectId {
        self.next_index += 1;
        (tag << 48) | self.next_index
    }

    fn take_failure(&mut self, op: VirtualOp) -> SaiResult<()> {
        match self.failures.remove(&op) {
            Some(status) => Err(SaiError::from_status(status)),
            None => Ok(()),
        }
    }

    fn is_referenced(&self, oid: RawSaiObjectId) -> bool {
        self.members.values().any(|m| m.spec.next_hop == oid)
            || self.routes.values().any(|&target| target == oid)
    }

    fn exists(&self, oid: RawSaiObjectId) -> bool {
        self.next_hops.contains_key(&oid) || self.groups.contains_key(&oid)
    }
}

/// In-memory switch with a fixed next-hop group ceiling.
pub struct VirtualSwitch {
    max_groups: u32,
    state: Mutex<SwitchState>,
}

impl VirtualSwitch {
    pub fn new(max_groups: u32) -> Self {
        Self {
            max_groups,
            state: Mutex::new(SwitchState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, SwitchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a next hop owned by the neighbor subsystem and returns its
    /// handle, as the neighbor table would after resolving an IP.
    pub fn register_next_hop(&self, spec: NextHopSpec) -> NextHopOid {
        let mut state = self.state();
        let oid = state.allocate(NEXT_HOP_TAG);
        state.next_hops.insert(oid, spec);
        NextHopOid::from_raw(oid).unwrap_or(NextHopOid::NULL)
    }

    /// Makes the next call of `op` fail with `status`.
    pub fn inject_failure(&self, op: VirtualOp, status: SaiStatus) {
        self.state().failures.insert(op, status);
    }

    pub fn group_count(&self) -> usize {
        self.state().groups.len()
    }

    pub fn next_hop_count(&self) -> usize {
        self.state().next_hops.len()
    }

    pub fn member_count(&self) -> usize {
        self.state().members.len()
    }

    pub fn route_count(&self) -> usize {
        self.state().routes.len()
    }

    pub fn groups(&self) -> Vec<NextHopGroupOid> {
        self.state()
            .groups
            .keys()
            .filter_map(|&oid| NextHopGroupOid::from_raw(oid))
            .collect()
    }

    pub fn is_group(&self, oid: RawSaiObjectId) -> bool {
        self.state().groups.contains_key(&oid)
    }

    pub fn next_hop_spec(&self, oid: RawSaiObjectId) -> Option<NextHopSpec> {
        self.state().next_hops.get(&oid).cloned()
    }

    /// Members of `group` in creation order.
    pub fn group_members(&self, group: NextHopGroupOid) -> Vec<GroupMemberSpec> {
        self.state()
            .members
            .values()
            .filter(|m| m.group == group.as_raw())
            .map(|m| m.spec)
            .collect()
    }

    pub fn class_map(&self, group: NextHopGroupOid) -> Option<BTreeMap<u8, u8>> {
        self.state()
            .groups
            .get(&group.as_raw())
            .and_then(|g| g.class_map.clone())
    }

    pub fn route_target(&self, entry: &RouteEntry) -> Option<RawSaiObjectId> {
        self.state().routes.get(entry).copied()
    }
}

impl NextHopGroupApi for VirtualSwitch {
    fn max_next_hop_groups(&self) -> SaiResult<u32> {
        Ok(self.max_groups)
    }

    fn create_next_hop(&self, spec: &NextHopSpec) -> SaiResult<NextHopOid> {
        let mut state = self.state();
        state.take_failure(VirtualOp::CreateNextHop)?;
        let oid = state.allocate(NEXT_HOP_TAG);
        state.next_hops.insert(oid, spec.clone());
        debug!("VirtualSwitch: created next hop {} as 0x{:x}", spec, oid);
        NextHopOid::from_raw(oid).ok_or_else(|| SaiError::internal("null next hop oid"))
    }

    fn remove_next_hop(&self, next_hop: NextHopOid) -> SaiResult<()> {
        let mut state = self.state();
        let oid = next_hop.as_raw();
        if !state.next_hops.contains_key(&oid) {
            return Err(SaiError::not_found(format!("next hop {}", next_hop)));
        }
        if state.is_referenced(oid) {
            return Err(SaiError::object_in_use(format!("next hop {}", next_hop)));
        }
        state.next_hops.remove(&oid);
        Ok(())
    }

    fn create_next_hop_group(
        &self,
        group_type: NextHopGroupType,
        class_map: Option<&BTreeMap<u8, u8>>,
    ) -> SaiResult<NextHopGroupOid> {
        let mut state = self.state();
        state.take_failure(VirtualOp::CreateGroup)?;
        if state.groups.len() >= self.max_groups as usize {
            return Err(SaiError::table_full("next_hop_group"));
        }
        if group_type == NextHopGroupType::ClassBased && class_map.is_none() {
            return Err(SaiError::invalid_parameter("class-based group without class map"));
        }
        let oid = state.allocate(GROUP_TAG);
        state.groups.insert(
            oid,
            GroupObject {
                group_type,
                class_map: class_map.cloned(),
            },
        );
        NextHopGroupOid::from_raw(oid).ok_or_else(|| SaiError::internal("null group oid"))
    }

    fn remove_next_hop_group(&self, group: NextHopGroupOid) -> SaiResult<()> {
        let mut state = self.state();
        let oid = group.as_raw();
        if !state.groups.contains_key(&oid) {
            return Err(SaiError::not_found(format!("next hop group {}", group)));
        }
        if state.members.values().any(|m| m.group == oid) || state.is_referenced(oid) {
            return Err(SaiError::object_in_use(format!("next hop group {}", group)));
        }
        state.groups.remove(&oid);
        Ok(())
    }

    fn set_class_map(&self, group: NextHopGroupOid, class_map: &BTreeMap<u8, u8>) -> SaiResult<()> {
        let mut state = self.state();
        state.take_failure(VirtualOp::SetClassMap)?;
        match state.groups.get_mut(&group.as_raw()) {
            Some(obj) if obj.group_type == NextHopGroupType::ClassBased => {
                obj.class_map = Some(class_map.clone());
                Ok(())
            }
            Some(_) => Err(SaiError::invalid_parameter("class map on non class-based group")),
            None => Err(SaiError::not_found(format!("next hop group {}", group))),
        }
    }

    fn create_group_member(
        &self,
        group: NextHopGroupOid,
        member: &GroupMemberSpec,
    ) -> SaiResult<NextHopGroupMemberOid> {
        let mut state = self.state();
        state.take_failure(VirtualOp::CreateMember)?;
        if !state.groups.contains_key(&group.as_raw()) {
            return Err(SaiError::not_found(format!("next hop group {}", group)));
        }
        if !state.exists(member.next_hop) {
            return Err(SaiError::invalid_parameter(format!(
                "member target 0x{:x} does not exist",
                member.next_hop
            )));
        }
        if member.weight == 0 {
            return Err(SaiError::invalid_parameter("member weight must be positive"));
        }
        let oid = state.allocate(MEMBER_TAG);
        state.members.insert(
            oid,
            MemberObject {
                group: group.as_raw(),
                spec: *member,
            },
        );
        NextHopGroupMemberOid::from_raw(oid).ok_or_else(|| SaiError::internal("null member oid"))
    }

    fn remove_group_member(&self, member: NextHopGroupMemberOid) -> SaiResult<()> {
        let mut state = self.state();
        state.take_failure(VirtualOp::RemoveMember)?;
        state
            .members
            .remove(&member.as_raw())
            .map(|_| ())
            .ok_or_else(|| SaiError::not_found(format!("group member {}", member)))
    }

    fn set_member_weight(&self, member: NextHopGroupMemberOid, weight: u32) -> SaiResult<()> {
        if weight == 0 {
            return Err(SaiError::invalid_parameter("member weight must be positive"));
        }
        let mut state = self.state();
        state.take_failure(VirtualOp::SetMemberWeight)?;
        match state.members.get_mut(&member.as_raw()) {
            Some(obj) => {
                obj.spec.weight = weight;
                Ok(())
            }
            None => Err(SaiError::not_found(format!("group member {}", member))),
        }
    }

    fn set_member_next_hop(
        &self,
        member: NextHopGroupMemberOid,
        next_hop: RawSaiObjectId,
    ) -> SaiResult<()> {
        let mut state = self.state();
        state.take_failure(VirtualOp::SetMemberNextHop)?;
        if !state.exists(next_hop) {
            return Err(SaiError::invalid_parameter(format!(
                "member target 0x{:x} does not exist",
                next_hop
            )));
        }
        match state.members.get_mut(&member.as_raw()) {
            Some(obj) => {
                obj.spec.next_hop = next_hop;
                Ok(())
            }
            None => Err(SaiError::not_found(format!("group member {}", member))),
        }
    }

    fn set_route(&self, entry: &RouteEntry, next_hop: RawSaiObjectId) -> SaiResult<()> {
        let mut state = self.state();
        state.take_failure(VirtualOp::SetRoute)?;
        if !state.exists(next_hop) {
            return Err(SaiError::invalid_parameter(format!(
                "route target 0x{:x} does not exist",
                next_hop
            )));
        }
        state.routes.insert(entry.clone(), next_hop);
        Ok(())
    }

    fn remove_route(&self, entry: &RouteEntry) -> SaiResult<()> {
        self.state()
            .routes
            .remove(entry)
            .map(|_| ())
            .ok_or_else(|| SaiError::not_found(format!("route {}", entry)))
    }
}
