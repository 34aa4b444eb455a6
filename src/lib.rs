//! # avlkit - AVL Tree Engine
//!
//! avlkit is a self-balancing ordered tree with flexible traversal:
//! prefix, infix, suffix and breadth orders in either direction,
//! range-bounded visits that prune whole subtrees, resumable cursors, and
//! parallel visits that fan large subtrees out to jobs and merge their
//! results.
//!
//! ## Architecture
//!
//! - **Tree**: `Box`-linked nodes with stored balance factors, rebalanced
//!   bottom-up on every insert and remove
//! - **Traversal**: one resumable walker drives callback visits, range visits
//!   and cursors alike
//! - **Parallel visitor**: scoped jobs borrow the tree; merge visits give
//!   each job a private [`Collector`]
//! - **Shared scratch**: traversal stacks can be recycled across trees
//!
//! ## Example Usage
//!
//! ```
//! use avlkit::{AvlTree, VisitAction, VisitFlags};
//!
//! let tree: AvlTree<u32> = [2, 9, 4, 5, 8, 3, 6, 1, 7, 4, 1].into_iter().collect();
//! assert_eq!(tree.len(), 11);
//!
//! // Range visit
//! let mut in_range = Vec::new();
//! tree.visit_range(&3, &6, VisitFlags::empty(), |node, _| {
//!     in_range.push(*node.value());
//!     VisitAction::Continue
//! })
//! .unwrap();
//! assert_eq!(in_range, vec![3, 4, 4, 5, 6]);
//!
//! // Cursor, largest first
//! let top: Vec<u32> = tree
//!     .cursor(VisitFlags::INFIX | VisitFlags::RIGHT_TO_LEFT)
//!     .unwrap()
//!     .take(2)
//!     .copied()
//!     .collect();
//! assert_eq!(top, vec![9, 8]);
//!
//! // Parallel export; order across jobs is unspecified
//! let mut all = tree.par_to_array(VisitFlags::PREFIX).unwrap();
//! all.sort();
//! assert_eq!(all.len(), 11);
//! ```
//!
//! ## Modules
//!
//! - [`tree`]: tree storage, insert/remove/find, invariant audit
//! - [`visit`]: traversal flags, visitor protocol, sequential/range/parallel visits
//! - [`iter`]: resumable cursors
//! - [`export`]: list, array and ring-buffer exports
//! - [`collector`]: result collector with ring mode
//! - [`job`]: thread-backed jobs
//! - [`scratch`]: traversal stacks shared between trees
//! - [`metrics`]: latency and traversal counters
//! - [`config`]: configuration structures
//! - [`error`]: error types and result aliases

/// Result collector used by merge visits and exports
pub mod collector;

/// Configuration structures and validation
pub mod config;

/// Error types and result aliases
pub mod error;

/// Whole-tree exports
pub mod export;

/// Resumable cursors
pub mod iter;

/// Thread-backed job primitives
pub mod job;

/// Performance metrics collection and reporting
pub mod metrics;

/// Shared traversal stack storage
pub mod scratch;

/// AVL tree storage
pub mod tree;

/// Traversal engine
pub mod visit;

/// Command-line harness
pub mod cli;

// Re-export commonly used types
pub use collector::Collector;
pub use config::{InsertPolicy, TreeConfig};
pub use error::{AvlError, Result};
pub use iter::TreeIter;
pub use job::{Job, JobError, JobResult, JobToken};
pub use scratch::{ScratchStats, SharedScratch};
pub use tree::{AuditReport, AvlTree, Compare, InsertOutcome, NaturalOrder, Node};
pub use visit::{Ancestors, VisitAction, VisitContext, VisitFlags, VisitState, VisitSummary};
