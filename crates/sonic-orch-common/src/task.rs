//! Task processing status.

/// Result of processing a single intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// Intent applied
    Success,
    /// Intent is malformed; dropped without side effects
    InvalidEntry,
    /// Hardware or internal failure; dropped, object left in its last good state
    Failed,
    /// Intent was rejected by current state and is kept to be retried
    NeedRetry,
    /// Intent references something that does not exist yet
    WaitingForDependency,
}

impl TaskStatus {
    /// Returns true if the task completed successfully.
    pub fn is_success(&self) -> bool {
        matches!(self, TaskStatus::Success)
    }

    /// Returns true if the intent should be kept for another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TaskStatus::NeedRetry | TaskStatus::WaitingForDependency)
    }

    /// Returns true if the task failed permanently.
    pub fn is_failure(&self) -> bool {
        matches!(self, TaskStatus::InvalidEntry | TaskStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classes_are_disjoint() {
        for status in [
            TaskStatus::Success,
            TaskStatus::InvalidEntry,
            TaskStatus::Failed,
            TaskStatus::NeedRetry,
            TaskStatus::WaitingForDependency,
        ] {
            let classes = [status.is_success(), status.is_retryable(), status.is_failure()];
            assert_eq!(classes.iter().filter(|c| **c).count(), 1, "{:?}", status);
        }
    }
}
