//! Error types for next-hop group synchronization.

use sonic_orch_common::{SyncMapError, TaskStatus};
use sonic_sai::SaiError;
use thiserror::Error;

/// Errors raised while applying an intent.
///
/// Every variant maps to a [`TaskStatus`] through [`NhgError::to_status`],
/// which decides whether the intent is dropped or kept for a retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NhgError {
    /// Bad syntax or inconsistent fields
    #[error("Malformed intent: {0}")]
    MalformedIntent(String),

    #[error("Invalid class map: {0}")]
    InvalidClassMap(String),

    /// The intent names groups that do not exist yet
    #[error("Unresolved reference to group(s) {}", .missing.join(","))]
    UnresolvedReference { missing: Vec<String> },

    #[error("Group {group} is still referenced (ref_count={ref_count}), delete rejected")]
    ReferencedDelete { group: String, ref_count: u32 },

    /// A referenced group may not move between one and several members
    #[error("Group {group} is still referenced (ref_count={ref_count}), resize from {from} to {to} members rejected")]
    ReferencedResize {
        group: String,
        ref_count: u32,
        from: usize,
        to: usize,
    },

    #[error("Group not found: {0}")]
    GroupNotFound(String),

    #[error("SAI error: {0}")]
    Hardware(#[from] SaiError),

    #[error("Reference count error: {0}")]
    RefCount(#[from] SyncMapError),
}

impl NhgError {
    pub fn malformed(message: impl Into<String>) -> Self {
        NhgError::MalformedIntent(message.into())
    }

    pub fn class_map(message: impl Into<String>) -> Self {
        NhgError::InvalidClassMap(message.into())
    }

    /// Returns true when the switch refused an object for lack of room.
    pub fn is_capacity_exhausted(&self) -> bool {
        matches!(self, NhgError::Hardware(e) if e.is_capacity_exhausted())
    }

    /// Maps the error to the fate of the intent that raised it.
    pub fn to_status(&self) -> TaskStatus {
        match self {
            NhgError::MalformedIntent(_) | NhgError::InvalidClassMap(_) => TaskStatus::InvalidEntry,
            NhgError::UnresolvedReference { .. } => TaskStatus::WaitingForDependency,
            NhgError::ReferencedDelete { .. } | NhgError::ReferencedResize { .. } => {
                TaskStatus::NeedRetry
            }
            NhgError::GroupNotFound(_) => TaskStatus::InvalidEntry,
            NhgError::Hardware(_) | NhgError::RefCount(_) => TaskStatus::Failed,
        }
    }
}

/// Result type for next-hop group operations.
pub type Result<T> = std::result::Result<T, NhgError>;
