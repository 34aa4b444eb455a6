//! Whole-tree exports into standard containers.
//!
//! Every export performs one full traversal in a single order and yields
//! exactly [`len`](AvlTree::len) references. Sequential exports keep
//! traversal order. Parallel exports go through
//! [`par_visit_merge`](AvlTree::par_visit_merge) and only guarantee the
//! same multiset of values.

use crate::collector::Collector;
use crate::error::{AvlError, Result};
use crate::tree::{AvlTree, Compare};
use crate::visit::{VisitAction, VisitFlags};
use std::collections::LinkedList;

/// Exports need exactly one order so that every node is reported once.
fn single_order(flags: VisitFlags) -> Result<VisitFlags> {
    let orders = flags
        & (VisitFlags::PREFIX | VisitFlags::INFIX | VisitFlags::SUFFIX | VisitFlags::BREADTH);
    if orders.bits().count_ones() != 1 {
        return Err(AvlError::invalid("exports need exactly one traversal order"));
    }
    Ok(flags)
}

fn check_len(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(AvlError::Corrupted {
            depth: 0,
            reason: format!("export produced {} values for {} nodes", actual, expected),
        });
    }
    Ok(())
}

impl<T, C: Compare<T>> AvlTree<T, C> {
    /// Values in traversal order as a linked list.
    pub fn to_list(&self, flags: VisitFlags) -> Result<LinkedList<&T>> {
        let flags = single_order(flags)?;
        let mut list = LinkedList::new();
        self.visit(flags, |node, _| {
            list.push_back(node.value());
            VisitAction::Continue
        })?;

        check_len(self.len(), list.len())?;
        Ok(list)
    }

    /// Values in traversal order as a vector sized up front.
    ///
    /// # Errors
    ///
    /// `AllocationFailed` if room for `len` references cannot be reserved.
    pub fn to_array(&self, flags: VisitFlags) -> Result<Vec<&T>> {
        let flags = single_order(flags)?;
        let mut array = Vec::new();
        array.try_reserve_exact(self.len())?;
        self.visit(flags, |node, _| {
            array.push(node.value());
            VisitAction::Continue
        })?;

        check_len(self.len(), array.len())?;
        Ok(array)
    }

    /// Values in traversal order in a ring buffer holding exactly `len`
    /// entries (at least one).
    pub fn to_ring_buffer(&self, flags: VisitFlags) -> Result<Collector<&T>> {
        let flags = single_order(flags)?;
        let mut ring = Collector::ring(self.len().max(1))?;
        let mut failure = None;
        self.visit(flags, |node, _| match ring.push(node.value()) {
            Ok(()) => VisitAction::Continue,
            Err(e) => {
                failure = Some(e);
                VisitAction::Abort
            }
        })
        .map_err(|e| failure.take().unwrap_or(e))?;

        check_len(self.len(), ring.len())?;
        Ok(ring)
    }
}

impl<T, C> AvlTree<T, C>
where
    T: Sync,
    C: Compare<T> + Sync,
{
    /// Parallel [`to_array`](Self::to_array). Order across subtrees is
    /// unspecified.
    pub fn par_to_array(&self, flags: VisitFlags) -> Result<Vec<&T>> {
        let collected = self.par_collect(flags)?;
        let mut array = Vec::new();
        array.try_reserve_exact(collected.len())?;
        array.extend(collected);

        check_len(self.len(), array.len())?;
        Ok(array)
    }

    /// Parallel [`to_list`](Self::to_list). Order across subtrees is
    /// unspecified.
    pub fn par_to_list(&self, flags: VisitFlags) -> Result<LinkedList<&T>> {
        let list: LinkedList<&T> = self.par_collect(flags)?.into_iter().collect();
        check_len(self.len(), list.len())?;
        Ok(list)
    }

    fn par_collect(&self, flags: VisitFlags) -> Result<Collector<&T>> {
        let flags = single_order(flags)?;
        let (collected, summary) = self.par_visit_merge(flags, |node, _, out| {
            match out.push(node.value()) {
                Ok(()) => VisitAction::Continue,
                Err(_) => VisitAction::Abort,
            }
        })?;

        tracing::trace!(
            values = collected.len(),
            merges = summary.merges,
            "parallel export collected"
        );
        Ok(collected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TreeConfig;
    use crate::tree::NaturalOrder;

    fn sample() -> AvlTree<i32> {
        [2, 9, 4, 5, 8, 3, 6, 1, 7, 4, 1].into_iter().collect()
    }

    #[test]
    fn test_to_array_infix() {
        let tree = sample();
        let array = tree.to_array(VisitFlags::INFIX).unwrap();
        let values: Vec<i32> = array.into_iter().copied().collect();
        assert_eq!(values, vec![1, 1, 2, 3, 4, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_to_list_matches_array() {
        let tree = sample();
        for flags in [VisitFlags::PREFIX, VisitFlags::SUFFIX, VisitFlags::BREADTH] {
            let list: Vec<&i32> = tree.to_list(flags).unwrap().into_iter().collect();
            let array = tree.to_array(flags).unwrap();
            assert_eq!(list, array);
            assert_eq!(list.len(), tree.len());
        }
    }

    #[test]
    fn test_to_ring_buffer() {
        let tree = sample();
        let ring = tree
            .to_ring_buffer(VisitFlags::INFIX | VisitFlags::RIGHT_TO_LEFT)
            .unwrap();

        assert_eq!(ring.len(), 11);
        assert_eq!(ring.capacity(), Some(11));
        assert_eq!(ring.dropped(), 0);
        assert_eq!(ring.get(0), Some(&&9));
        assert_eq!(ring.get(10), Some(&&1));
    }

    #[test]
    fn test_exports_of_empty_tree() {
        let tree: AvlTree<i32> = AvlTree::new();
        assert!(tree.to_array(VisitFlags::INFIX).unwrap().is_empty());
        assert!(tree.to_list(VisitFlags::INFIX).unwrap().is_empty());
        assert!(tree.to_ring_buffer(VisitFlags::INFIX).unwrap().is_empty());
    }

    #[test]
    fn test_combined_orders_rejected() {
        let tree = sample();
        let result = tree.to_array(VisitFlags::PREFIX | VisitFlags::INFIX);
        assert!(matches!(result, Err(AvlError::InvalidArgument(_))));
        assert!(tree.to_list(VisitFlags::RIGHT_TO_LEFT).is_err());
    }

    #[test]
    fn test_parallel_exports_match_as_multisets() {
        let config = TreeConfig::new().with_parallel_threshold(100);
        let mut tree = AvlTree::with_config(NaturalOrder, config).unwrap();
        for v in 0..3000u32 {
            tree.insert(v % 1700).unwrap();
        }

        let mut expected = tree.to_array(VisitFlags::PREFIX).unwrap();
        let mut parallel = tree.par_to_array(VisitFlags::PREFIX).unwrap();
        let mut list: Vec<&u32> = tree
            .par_to_list(VisitFlags::PREFIX)
            .unwrap()
            .into_iter()
            .collect();

        expected.sort_unstable();
        parallel.sort_unstable();
        list.sort_unstable();
        assert_eq!(parallel, expected);
        assert_eq!(list, expected);
    }
}
