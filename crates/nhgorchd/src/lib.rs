//! SONiC next-hop group synchronization.
//!
//! Translates next-hop group, class-based group, route and label route
//! intents into a bounded set of hardware ECMP groups:
//!
//! - [`nexthop`]: next-hop identity and reference-counted resolution
//! - [`nhg`]: member normalization, the group table and its capacity pool
//! - [`cbf`]: class-based forwarding groups over named groups
//! - [`route`]: route bindings and forwarding entry programming
//! - [`reactor`]: link and neighbor events driving membership repair
//! - [`orch`]: [`NhgSyncOrch`], the single writer tying the above together
//! - [`daemon`]: the tokio event loop feeding the orchestrator
//!
//! # Example
//!
//! ```
//! use nhgorchd::config::NhgOrchConfig;
//! use nhgorchd::nhg::{GroupId, GroupStatus};
//! use nhgorchd::orch::{NhgSyncOrch, NEXT_HOP_GROUP_TABLE};
//! use sonic_orch_common::KeyOpFieldsValues;
//! use sonic_sai::VirtualSwitch;
//! use std::sync::Arc;
//!
//! let switch = Arc::new(VirtualSwitch::new(16));
//! let mut orch = NhgSyncOrch::new(switch, &NhgOrchConfig::default());
//! orch.add_entries(
//!     NEXT_HOP_GROUP_TABLE,
//!     vec![KeyOpFieldsValues::set_fields(
//!         "nhg1",
//!         &[("nexthop", "10.0.0.1,10.0.0.3"), ("ifname", "Ethernet0,Ethernet4")],
//!     )],
//! );
//! orch.process_pending();
//!
//! // No neighbor is resolved yet
//! let id = GroupId::Named("nhg1".to_string());
//! assert_eq!(orch.group_state(&id), Some(GroupStatus::Unresolved));
//! ```

pub mod audit;
pub mod cbf;
pub mod config;
pub mod daemon;
pub mod error;
pub mod nexthop;
pub mod nhg;
pub mod orch;
pub mod reactor;
pub mod replay;
pub mod route;

pub use config::NhgOrchConfig;
pub use daemon::{Intent, NhgDaemon};
pub use error::{NhgError, Result};
pub use orch::{NhgStats, NhgSyncOrch};
