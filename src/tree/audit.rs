use super::{AvlTree, Compare, Node};
use crate::error::{AvlError, Result};
use serde::Serialize;
use std::cmp::Ordering;

/// Shape of a tree that passed [`AvlTree::audit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub nodes: usize,
    pub height: usize,
}

impl<T, C: Compare<T>> AvlTree<T, C> {
    /// Walks the whole tree and checks every structural invariant:
    ///
    /// - each stored balance factor equals `height(right) - height(left)`
    ///   and lies in `-1..=1`
    /// - every value sits between the values of the ancestors it descends
    ///   from (equal values allowed on either side)
    /// - the number of reachable nodes equals [`len`](AvlTree::len)
    ///
    /// This is `O(n)` and never runs as part of insert/remove.
    ///
    /// # Errors
    ///
    /// Returns `Corrupted` describing the first violation found.
    pub fn audit(&self) -> Result<AuditReport> {
        let (nodes, height) = self.audit_node(self.root(), 0, None, None)?;
        if nodes != self.len {
            return Err(AvlError::Corrupted {
                depth: 0,
                reason: format!("count is {} but {} nodes are reachable", self.len, nodes),
            });
        }
        Ok(AuditReport { nodes, height })
    }

    fn audit_node(
        &self,
        node: Option<&Node<T>>,
        depth: usize,
        lower: Option<&T>,
        upper: Option<&T>,
    ) -> Result<(usize, usize)> {
        let Some(node) = node else {
            return Ok((0, 0));
        };

        let corrupted = |reason: String| AvlError::Corrupted { depth, reason };

        if let Some(lower) = lower {
            if self.cmp.compare(&node.value, lower) == Ordering::Less {
                return Err(corrupted("value sorts before its left bound".to_string()));
            }
        }
        if let Some(upper) = upper {
            if self.cmp.compare(&node.value, upper) == Ordering::Greater {
                return Err(corrupted("value sorts after its right bound".to_string()));
            }
        }

        let (left_nodes, left_height) =
            self.audit_node(node.left(), depth + 1, lower, Some(&node.value))?;
        let (right_nodes, right_height) =
            self.audit_node(node.right(), depth + 1, Some(&node.value), upper)?;

        let actual = right_height as isize - left_height as isize;
        if actual != node.balance as isize {
            return Err(corrupted(format!(
                "stored balance {} but subtree heights give {}",
                node.balance, actual
            )));
        }
        if !(-1..=1).contains(&actual) {
            return Err(corrupted(format!("unbalanced by {}", actual)));
        }

        Ok((
            left_nodes + right_nodes + 1,
            left_height.max(right_height) + 1,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Link;

    fn leaf(value: i32) -> Link<i32> {
        Some(Box::new(Node::new(value)))
    }

    #[test]
    fn test_audit_empty() {
        let tree: AvlTree<i32> = AvlTree::new();
        assert_eq!(tree.audit().unwrap(), AuditReport { nodes: 0, height: 0 });
    }

    #[test]
    fn test_audit_detects_bad_balance() {
        let mut tree: AvlTree<i32> = [2, 1, 3].into_iter().collect();
        if let Some(root) = tree.root.as_mut() {
            root.balance = 1;
        }
        assert!(matches!(tree.audit(), Err(AvlError::Corrupted { depth: 0, .. })));
    }

    #[test]
    fn test_audit_detects_order_violation() {
        let mut tree: AvlTree<i32> = [2, 1, 3].into_iter().collect();
        if let Some(root) = tree.root.as_mut() {
            root.left = leaf(10);
        }
        assert!(matches!(tree.audit(), Err(AvlError::Corrupted { depth: 1, .. })));
    }

    #[test]
    fn test_audit_detects_count_mismatch() {
        let mut tree: AvlTree<i32> = [2, 1, 3].into_iter().collect();
        tree.len = 4;
        assert!(tree.audit().is_err());
    }

    #[test]
    fn test_audit_accepts_duplicates() {
        let tree: AvlTree<i32> = [4, 4, 4, 4, 4, 4, 4].into_iter().collect();
        let report = tree.audit().unwrap();
        assert_eq!(report.nodes, 7);
    }
}
