//! Type-safe SAI (Switch Abstraction Interface) surface for next-hop group
//! programming.
//!
//! - [`types`]: typed object IDs so a group member OID can never be passed
//!   where a next-hop OID is expected
//! - [`error`]: SAI status codes and [`SaiError`]
//! - [`api`]: the [`NextHopGroupApi`] contract consumed by the orchestration
//!   layer, plus route entry keys
//! - [`virtual_switch`]: an in-memory implementation of the contract that
//!   enforces the group-count ceiling, used for replay and tests
//!
//! # Example
//!
//! ```
//! use sonic_sai::{NextHopGroupApi, NextHopGroupType, VirtualSwitch};
//!
//! let switch = VirtualSwitch::new(2);
//! let group = switch.create_next_hop_group(NextHopGroupType::Ecmp, None).unwrap();
//! assert_eq!(switch.group_count(), 1);
//! switch.remove_next_hop_group(group).unwrap();
//! ```

pub mod api;
pub mod error;
pub mod types;
pub mod virtual_switch;

pub use api::{GroupMemberSpec, NextHopGroupApi, NextHopGroupType, NextHopSpec, RouteEntry};
pub use error::{SaiError, SaiResult, SaiStatus};
pub use types::{
    NextHopGroupKind, NextHopGroupMemberKind, NextHopGroupMemberOid, NextHopGroupOid,
    NextHopKind, NextHopOid, RawSaiObjectId, SaiObjectId, SaiObjectKind,
};
pub use virtual_switch::{VirtualOp, VirtualSwitch};
