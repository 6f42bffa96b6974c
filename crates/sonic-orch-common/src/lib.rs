//! Common orchestration abstractions for SONiC.
//!
//! - [`Orch`]: base trait for orchestration agents driven by a daemon loop
//! - [`Consumer`]: per-table intent queue that coalesces intents per key
//! - [`SyncMap`]: ordered map that never creates entries implicitly, with
//!   checked reference counting
//! - [`RetryCache`]: intents parked until a named dependency appears
//! - [`TaskStatus`]: outcome of processing a single intent
//!
//! # Example
//!
//! ```ignore
//! use sonic_orch_common::{Orch, Consumer, TaskStatus};
//!
//! #[async_trait]
//! impl Orch for MyOrch {
//!     fn name(&self) -> &str { "MyOrch" }
//!
//!     async fn do_task(&mut self) {
//!         for entry in self.consumer.drain() {
//!             match self.process_entry(&entry) {
//!                 TaskStatus::NeedRetry => self.consumer.retry(entry),
//!                 status => log::debug!("{}: {:?}", entry.key, status),
//!             }
//!         }
//!     }
//! }
//! ```

mod consumer;
mod orch;
mod retry;
mod sync_map;
mod task;

pub use consumer::{Consumer, ConsumerConfig, FieldValue, KeyOpFieldsValues, Operation};
pub use orch::Orch;
pub use retry::{Constraint, RetryCache};
pub use sync_map::{HasRefCount, SyncMap, SyncMapError};
pub use task::TaskStatus;
