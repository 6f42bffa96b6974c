//! Base Orch trait.

use async_trait::async_trait;

/// Base trait for all orchestration agents.
///
/// The daemon calls [`do_task`](Orch::do_task) whenever
/// [`has_pending_tasks`](Orch::has_pending_tasks) reports work. Every
/// mutation an Orch performs happens inside `do_task` or another `&mut self`
/// method, so a single daemon loop is the only writer.
#[async_trait]
pub trait Orch: Send + Sync {
    /// Returns the name of this Orch (for logging and debugging).
    fn name(&self) -> &str;

    /// Processes pending tasks from all consumers.
    async fn do_task(&mut self);

    /// Returns the priority of this Orch (lower = higher priority).
    fn priority(&self) -> i32 {
        0
    }

    /// Returns true if this Orch has pending work.
    fn has_pending_tasks(&self) -> bool {
        false
    }

    /// Dumps pending tasks for debugging.
    fn dump_pending_tasks(&self) -> Vec<String> {
        vec![]
    }
}
