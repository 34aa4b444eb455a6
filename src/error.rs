//! Error types for avlkit.
//!
//! This module defines all error types that can occur during tree operations,
//! traversals and the job/collector plumbing underneath them.

use crate::job::JobError;
use std::collections::TryReserveError;
use thiserror::Error;

/// Result type alias for avlkit operations.
///
/// This is a convenience alias for `Result<T, AvlError>`.
pub type Result<T> = std::result::Result<T, AvlError>;

/// Error types for tree operations.
///
/// Every public operation reports failure through this enum. A failed call
/// leaves the tree in the state it had before the call.
#[derive(Error, Debug)]
pub enum AvlError {
    /// An argument or flag combination was rejected before anything ran.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The requested value is not stored in the tree.
    ///
    /// Returned by removals. Lookups return `Option` instead, so a stored
    /// value is never confused with this error.
    #[error("Value not found")]
    NotFound,

    /// Insertion refused because an equal value is already stored.
    ///
    /// Only produced under [`InsertPolicy::RejectError`](crate::InsertPolicy::RejectError).
    #[error("Value already exists")]
    AlreadyExists,

    /// Minimum/maximum requested from a tree with no nodes.
    #[error("Tree is empty")]
    EmptyTree,

    /// A result buffer could not grow.
    ///
    /// Export and merge buffers are grown with `try_reserve`, so running out
    /// of memory surfaces here instead of aborting.
    #[error("Allocation failed: {0}")]
    AllocationFailed(#[from] TryReserveError),

    /// A visitor returned [`VisitAction::Abort`](crate::VisitAction::Abort).
    ///
    /// This is a cooperative signal, not a fault: the visit stopped and did
    /// not finish.
    #[error("Visit aborted by visitor")]
    VisitAborted,

    /// A job backing a parallel visit failed.
    #[error("Job error: {0}")]
    Job(#[from] JobError),

    /// A bounded collector without overwrite mode is full.
    #[error("Collector full (capacity {capacity})")]
    CollectorFull {
        /// Configured capacity of the collector
        capacity: usize,
    },

    /// The invariant audit found a broken tree.
    ///
    /// Never raised by insert/remove/visit. [`AvlTree::audit`](crate::AvlTree::audit)
    /// reports it, as do exports whose output disagrees with the node count.
    #[error("Corrupted tree at depth {depth}: {reason}")]
    Corrupted {
        /// Depth of the offending node (root is 0)
        depth: usize,
        /// What the audit found
        reason: String,
    },

    /// Configuration validation failed.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// I/O error while reading or writing configuration files.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing or serialization failed.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl AvlError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        AvlError::InvalidArgument(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(AvlError::NotFound.to_string(), "Value not found");
        assert_eq!(AvlError::EmptyTree.to_string(), "Tree is empty");
        assert_eq!(
            AvlError::CollectorFull { capacity: 4 }.to_string(),
            "Collector full (capacity 4)"
        );
        assert_eq!(
            AvlError::invalid("no order").to_string(),
            "Invalid argument: no order"
        );
    }

    #[test]
    fn test_try_reserve_conversion() {
        let mut v: Vec<u64> = Vec::new();
        let err = v.try_reserve(usize::MAX).unwrap_err();
        let converted: AvlError = err.into();
        assert!(matches!(converted, AvlError::AllocationFailed(_)));
    }
}
