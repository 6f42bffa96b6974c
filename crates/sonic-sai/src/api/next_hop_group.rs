//! Next hop, next-hop group and group member programming contract.

use crate::error::SaiResult;
use crate::types::{NextHopGroupMemberOid, NextHopGroupOid, NextHopOid, RawSaiObjectId};
use crate::RouteEntry;
use sonic_types::{IpAddress, LabelStack};
use std::collections::BTreeMap;
use std::fmt;

/// Next-hop group type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NextHopGroupType {
    /// Equal/weighted cost multi-path group.
    #[default]
    Ecmp,
    /// Class-based group; members are selected by forwarding class.
    ClassBased,
}

/// Attributes of a next hop the orchestration layer creates itself.
///
/// Plain IP next hops are owned by the neighbor subsystem; only MPLS
/// labeled variants are created through [`NextHopGroupApi::create_next_hop`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NextHopSpec {
    pub ip: IpAddress,
    pub alias: String,
    pub labels: LabelStack,
}

impl fmt::Display for NextHopSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.labels.is_empty() {
            write!(f, "{}@{}", self.ip, self.alias)
        } else {
            write!(f, "{}+{}@{}", self.labels, self.ip, self.alias)
        }
    }
}

/// Attributes of a group member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupMemberSpec {
    /// Next hop or (for class-based groups) next-hop group the member points at.
    pub next_hop: RawSaiObjectId,
    pub weight: u32,
    /// Member index, used by class-based groups.
    pub index: Option<u32>,
}

/// Hardware operations needed to keep next-hop groups in sync.
///
/// Calls are synchronous and their result is final. A failure whose
/// [`is_capacity_exhausted`](crate::SaiError::is_capacity_exhausted) is true
/// means the switch had no room; any other failure is fatal for that object.
pub trait NextHopGroupApi: Send + Sync {
    /// Maximum number of next-hop groups the switch can hold.
    fn max_next_hop_groups(&self) -> SaiResult<u32>;

    fn create_next_hop(&self, spec: &NextHopSpec) -> SaiResult<NextHopOid>;
    fn remove_next_hop(&self, next_hop: NextHopOid) -> SaiResult<()>;

    /// Creates an empty group. `class_map` (forwarding class to member
    /// index) is required for class-based groups and ignored otherwise.
    fn create_next_hop_group(
        &self,
        group_type: NextHopGroupType,
        class_map: Option<&BTreeMap<u8, u8>>,
    ) -> SaiResult<NextHopGroupOid>;
    fn remove_next_hop_group(&self, group: NextHopGroupOid) -> SaiResult<()>;
    fn set_class_map(&self, group: NextHopGroupOid, class_map: &BTreeMap<u8, u8>) -> SaiResult<()>;

    fn create_group_member(
        &self,
        group: NextHopGroupOid,
        member: &GroupMemberSpec,
    ) -> SaiResult<NextHopGroupMemberOid>;
    fn remove_group_member(&self, member: NextHopGroupMemberOid) -> SaiResult<()>;
    fn set_member_weight(&self, member: NextHopGroupMemberOid, weight: u32) -> SaiResult<()>;
    fn set_member_next_hop(
        &self,
        member: NextHopGroupMemberOid,
        next_hop: RawSaiObjectId,
    ) -> SaiResult<()>;

    /// Creates the entry or repoints an existing one.
    fn set_route(&self, entry: &RouteEntry, next_hop: RawSaiObjectId) -> SaiResult<()>;
    fn remove_route(&self, entry: &RouteEntry) -> SaiResult<()>;
}
