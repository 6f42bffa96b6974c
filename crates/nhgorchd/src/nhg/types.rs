//! Group table types.

use super::{NextHopGroupKey, RequestedMember};
use crate::cbf::ClassMap;
use crate::nexthop::NextHopKey;
use serde::Serialize;
use sonic_orch_common::HasRefCount;
use sonic_sai::{NextHopGroupMemberOid, NextHopGroupOid, NextHopOid, RawSaiObjectId};
use std::fmt;

/// Identity of a group in the table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupId {
    /// Entry of NEXT_HOP_GROUP_TABLE.
    Named(String),
    /// Entry of CLASS_BASED_NEXT_HOP_GROUP_TABLE.
    ClassBased(String),
    /// Synthesized from the inline next hops of one or more routes.
    RouteOwned(NextHopGroupKey),
}

impl GroupId {
    /// Table key of a named or class-based group.
    pub fn name(&self) -> Option<&str> {
        match self {
            GroupId::Named(name) | GroupId::ClassBased(name) => Some(name),
            GroupId::RouteOwned(_) => None,
        }
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupId::Named(name) => write!(f, "nhg:{}", name),
            GroupId::ClassBased(name) => write!(f, "cbf:{}", name),
            GroupId::RouteOwned(key) => write!(f, "route:{}", key),
        }
    }
}

/// What a route or class-based member is programmed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardingHandle {
    NextHop(NextHopOid),
    Group(NextHopGroupOid),
}

impl ForwardingHandle {
    pub fn as_raw(&self) -> RawSaiObjectId {
        match self {
            ForwardingHandle::NextHop(oid) => oid.as_raw(),
            ForwardingHandle::Group(oid) => oid.as_raw(),
        }
    }
}

impl fmt::Display for ForwardingHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForwardingHandle::NextHop(oid) => write!(f, "nh {}", oid),
            ForwardingHandle::Group(oid) => write!(f, "nhg {}", oid),
        }
    }
}

/// Single next hop temporarily representing a pending group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandIn {
    pub key: NextHopKey,
    pub handle: NextHopOid,
}

/// Synchronization state of a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupState {
    /// No usable member; referrers are not programmed.
    Unresolved,
    /// Exactly one usable member; no hardware group exists.
    SingleNh { next_hop: NextHopKey, handle: NextHopOid },
    /// Hardware group allocated.
    Synced { oid: NextHopGroupOid },
    /// Waiting for a hardware slot. Class-based groups have no stand-in.
    Pending { stand_in: Option<StandIn> },
}

impl GroupState {
    pub fn handle(&self) -> Option<ForwardingHandle> {
        match self {
            GroupState::Unresolved => None,
            GroupState::SingleNh { handle, .. } => Some(ForwardingHandle::NextHop(*handle)),
            GroupState::Synced { oid } => Some(ForwardingHandle::Group(*oid)),
            GroupState::Pending { stand_in } => stand_in
                .as_ref()
                .map(|s| ForwardingHandle::NextHop(s.handle)),
        }
    }

    pub fn status(&self) -> GroupStatus {
        match self {
            GroupState::Unresolved => GroupStatus::Unresolved,
            GroupState::SingleNh { .. } => GroupStatus::SingleNh,
            GroupState::Synced { .. } => GroupStatus::Synced,
            GroupState::Pending { .. } => GroupStatus::Pending,
        }
    }

    pub fn is_synced(&self) -> bool {
        matches!(self, GroupState::Synced { .. })
    }
}

/// Observable summary of [`GroupState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    Unresolved,
    SingleNh,
    Synced,
    Pending,
}

impl fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupStatus::Unresolved => f.write_str("unresolved"),
            GroupStatus::SingleNh => f.write_str("single_nh"),
            GroupStatus::Synced => f.write_str("synced"),
            GroupStatus::Pending => f.write_str("pending"),
        }
    }
}

/// Member of a synced ECMP group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcmpMember {
    pub key: NextHopKey,
    pub weight: u32,
    pub handle: NextHopOid,
    pub member_oid: NextHopGroupMemberOid,
}

/// One position of a class-based group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CbfSlot {
    /// Current handle of the member group.
    pub handle: Option<ForwardingHandle>,
    /// Hardware member, present only while synced and the handle exists.
    pub member: Option<NextHopGroupMemberOid>,
}

/// Kind-specific body of a group.
#[derive(Debug, Clone)]
pub enum GroupKind {
    Ecmp {
        /// Parsed request, re-filtered on every reachability change.
        requested: Vec<RequestedMember>,
        /// Hardware members; empty unless synced.
        members: Vec<EcmpMember>,
    },
    ClassBased {
        members: Vec<String>,
        class_map: ClassMap,
        slots: Vec<CbfSlot>,
    },
}

impl GroupKind {
    pub fn member_count(&self) -> usize {
        match self {
            GroupKind::Ecmp { members, .. } => members.len(),
            GroupKind::ClassBased { slots, .. } => {
                slots.iter().filter(|s| s.member.is_some()).count()
            }
        }
    }

    pub fn requested(&self) -> Option<&[RequestedMember]> {
        match self {
            GroupKind::Ecmp { requested, .. } => Some(requested),
            GroupKind::ClassBased { .. } => None,
        }
    }
}

/// A row of the group table.
#[derive(Debug, Clone)]
pub struct GroupEntry {
    pub id: GroupId,
    pub kind: GroupKind,
    pub state: GroupState,
    /// Routes and class-based memberships bound to this group.
    pub ref_count: u32,
}

impl GroupEntry {
    pub fn new(id: GroupId, kind: GroupKind) -> Self {
        Self {
            id,
            kind,
            state: GroupState::Unresolved,
            ref_count: 0,
        }
    }

    pub fn handle(&self) -> Option<ForwardingHandle> {
        self.state.handle()
    }
}

impl HasRefCount for GroupEntry {
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

/// Notification that referrers of `id` must be repointed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleChange {
    pub id: GroupId,
    pub handle: Option<ForwardingHandle>,
}
