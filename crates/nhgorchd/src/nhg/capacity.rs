//! Hardware next-hop group slot accounting.

use super::GroupId;
use std::collections::VecDeque;

/// Finite pool of hardware group slots plus the FIFO of groups waiting
/// for one.
///
/// The pool only counts; hardware calls stay in the store. Which groups get
/// promoted is a pure function of the free slot count and queue order, see
/// [`promotions`](Self::promotions).
#[derive(Debug, Clone)]
pub struct CapacityPool {
    max: usize,
    synced: usize,
    pending: VecDeque<GroupId>,
}

impl CapacityPool {
    pub fn new(max: usize) -> Self {
        Self {
            max,
            synced: 0,
            pending: VecDeque::new(),
        }
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Number of groups holding a hardware slot.
    pub fn synced(&self) -> usize {
        self.synced
    }

    pub fn free(&self) -> usize {
        self.max.saturating_sub(self.synced)
    }

    pub fn has_free(&self) -> bool {
        self.free() > 0
    }

    /// Records a hardware group that was just created.
    pub fn allocate(&mut self) {
        self.synced += 1;
    }

    /// Records a hardware group that was just retired.
    pub fn release(&mut self) {
        self.synced = self.synced.saturating_sub(1);
    }

    /// Appends a group to the waiting queue unless it already waits.
    pub fn enqueue(&mut self, id: GroupId) {
        if !self.pending.contains(&id) {
            self.pending.push_back(id);
        }
    }

    /// Removes a group from the waiting queue.
    pub fn dequeue(&mut self, id: &GroupId) -> bool {
        match self.pending.iter().position(|p| p == id) {
            Some(pos) => {
                self.pending.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Moves a waiting group to the back of the queue.
    pub fn requeue_back(&mut self, id: &GroupId) {
        if self.dequeue(id) {
            self.pending.push_back(id.clone());
        }
    }

    pub fn is_pending(&self, id: &GroupId) -> bool {
        self.pending.contains(id)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn pending(&self) -> impl Iterator<Item = &GroupId> {
        self.pending.iter()
    }

    /// Groups to promote now: the oldest waiting groups, one per free slot.
    pub fn promotions(&self) -> Vec<GroupId> {
        self.pending.iter().take(self.free()).cloned().collect()
    }
}
