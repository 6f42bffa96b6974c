//! Next-hop groups: member normalization, group identity, the hardware
//! slot pool and the reference-counted group table.

mod capacity;
mod class_based;
mod key;
mod normalize;
mod store;
mod types;

pub use capacity::CapacityPool;
pub use key::NextHopGroupKey;
pub use normalize::{parse_members, usable_members, ActiveMember, RequestedMember, MAX_WEIGHT};
pub use store::{NextHopGroupStore, StoreStats};
pub use types::{
    CbfSlot, EcmpMember, ForwardingHandle, GroupEntry, GroupId, GroupKind, GroupState,
    GroupStatus, HandleChange, StandIn,
};
