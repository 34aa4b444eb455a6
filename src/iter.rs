//! Cursors over a tree.
//!
//! A [`TreeIter`] performs the same walk as [`AvlTree::visit`] but hands
//! out one node per call. It keeps its own stack between calls, so a
//! cursor can be parked and resumed at any point. Dropping it, or calling
//! [`TreeIter::abort`], gives the stack back.

use crate::error::{AvlError, Result};
use crate::tree::{AvlTree, Compare, NaturalOrder, Node};
use crate::visit::walk::{Bounds, Walker};
use crate::visit::{VisitContext, VisitFlags};
use std::iter::FusedIterator;

/// Resumable cursor, see the [module docs](self).
pub struct TreeIter<'a, T, C = NaturalOrder> {
    walker: Walker<'a, T, C>,
    finished: bool,
}

impl<'a, T, C: Compare<T>> TreeIter<'a, T, C> {
    fn new(walker: Walker<'a, T, C>) -> Self {
        Self {
            walker,
            finished: false,
        }
    }

    /// Next node together with its position, or `None` once exhausted.
    /// The context borrows the cursor until the next call.
    pub fn next_entry(&mut self) -> Option<(&'a Node<T>, VisitContext<'a, '_, T>)> {
        if self.finished {
            return None;
        }
        let entry = self.walker.next();
        if entry.is_none() {
            self.finished = true;
        }
        entry
    }

    /// Abandons the walk. Every later call yields `None`.
    pub fn abort(&mut self) {
        self.finished = true;
        self.walker.release();
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn flags(&self) -> VisitFlags {
        self.walker.flags()
    }
}

impl<'a, T, C: Compare<T>> Iterator for TreeIter<'a, T, C> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        self.next_entry().map(|(node, _)| node.value())
    }
}

impl<T, C: Compare<T>> FusedIterator for TreeIter<'_, T, C> {}

impl<T, C: Compare<T>> AvlTree<T, C> {
    /// Values in ascending order.
    pub fn iter(&self) -> TreeIter<'_, T, C> {
        TreeIter::new(self.walker(VisitFlags::INFIX, None))
    }

    /// Cursor in the order selected by `flags`.
    ///
    /// With combined orders a node is yielded once per selected order;
    /// [`TreeIter::next_entry`] tells them apart.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `flags` are unusable or ask for a parallel
    /// walk.
    pub fn cursor(&self, flags: VisitFlags) -> Result<TreeIter<'_, T, C>> {
        flags.validate()?;
        if flags.contains(VisitFlags::PARALLEL) {
            return Err(AvlError::invalid("cursors cannot run in parallel"));
        }
        Ok(TreeIter::new(self.walker(flags, None)))
    }

    /// Ascending cursor over the values `v` with `min <= v <= max`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `min` sorts after `max`.
    pub fn range<'a>(&'a self, min: &'a T, max: &'a T) -> Result<TreeIter<'a, T, C>> {
        self.bounded(min, max, VisitFlags::INFIX)
    }

    /// Descending cursor over the values `v` with `min <= v <= max`.
    pub fn range_rev<'a>(&'a self, min: &'a T, max: &'a T) -> Result<TreeIter<'a, T, C>> {
        self.bounded(min, max, VisitFlags::INFIX | VisitFlags::RIGHT_TO_LEFT)
    }

    fn bounded<'a>(&'a self, min: &'a T, max: &'a T, flags: VisitFlags) -> Result<TreeIter<'a, T, C>> {
        if self.comparator().compare(min, max) == std::cmp::Ordering::Greater {
            return Err(AvlError::invalid("range minimum sorts after its maximum"));
        }
        Ok(TreeIter::new(self.walker(flags, Some(Bounds { min, max }))))
    }

    fn walker<'a>(&'a self, flags: VisitFlags, bounds: Option<Bounds<'a, T>>) -> Walker<'a, T, C> {
        Walker::start(
            self.root(),
            Vec::new(),
            self.comparator(),
            flags,
            bounds,
            self.scratch(),
        )
    }
}

impl<'a, T, C: Compare<T>> IntoIterator for &'a AvlTree<T, C> {
    type Item = &'a T;
    type IntoIter = TreeIter<'a, T, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
