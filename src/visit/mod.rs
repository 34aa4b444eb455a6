//! Tree traversal.
//!
//! A visit calls a visitor for nodes in the orders selected by
//! [`VisitFlags`]. Depth-first orders (prefix, infix, suffix) can be
//! combined, in which case a node is reported once per selected order with
//! the matching [`VisitState`]. Breadth order stands alone.
//!
//! The visitor steers the walk through the [`VisitAction`] it returns:
//! `Stop` ends the visit successfully, `Abort` ends it with
//! [`AvlError::VisitAborted`].

mod parallel;
pub(crate) mod walk;

use crate::error::{AvlError, Result};
use crate::tree::{AvlTree, Compare, Node};
use bitflags::bitflags;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use walk::{Bounds, Lineage, Walker};

bitflags! {
    /// Traversal selection.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct VisitFlags: u16 {
        /// Node before its children.
        const PREFIX = 1 << 0;
        /// Node between its children.
        const INFIX = 1 << 1;
        /// Node after its children.
        const SUFFIX = 1 << 2;
        /// Level by level from the root.
        const BREADTH = 1 << 3;
        /// Right child before left child.
        const RIGHT_TO_LEFT = 1 << 4;
        /// Fan subtrees out to jobs.
        const PARALLEL = 1 << 5;
        /// Jobs collect into private buffers merged by their parent.
        const MERGE = 1 << 6;
    }
}

impl VisitFlags {
    const DEPTH_FIRST: VisitFlags = VisitFlags::PREFIX
        .union(VisitFlags::INFIX)
        .union(VisitFlags::SUFFIX);

    /// Checks that the flags describe a traversal that can be carried out.
    pub fn validate(self) -> Result<()> {
        let depth_first = self.intersects(Self::DEPTH_FIRST);
        let breadth = self.contains(Self::BREADTH);

        if !depth_first && !breadth {
            return Err(AvlError::invalid("no traversal order selected"));
        }
        if depth_first && breadth {
            return Err(AvlError::invalid(
                "breadth order cannot be combined with depth-first orders",
            ));
        }
        if breadth && self.contains(Self::PARALLEL) {
            return Err(AvlError::invalid("breadth order cannot run in parallel"));
        }
        if self.contains(Self::MERGE) && !self.contains(Self::PARALLEL) {
            return Err(AvlError::invalid("merge requires a parallel visit"));
        }
        Ok(())
    }
}

/// What the visitor wants next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitAction {
    Continue,
    /// End the visit; it still reports success.
    Stop,
    /// End the visit; it reports [`AvlError::VisitAborted`].
    Abort,
}

/// Which order a node is being reported for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitState {
    Prefix,
    Infix,
    Suffix,
    Breadth,
}

/// Where a visited node sits, handed to the visitor alongside the node.
///
/// `'a` is the tree borrow; `'p` borrows the walk's ancestor chain and
/// ends when the visitor returns. The tree itself is not part of the
/// context: visitors that need it capture `&tree`, which is already
/// borrowed for `'a` by the visit.
pub struct VisitContext<'a, 'p, T> {
    state: VisitState,
    depth: usize,
    lineage: Lineage<'a, 'p, T>,
    flags: VisitFlags,
}

impl<'a, 'p, T> VisitContext<'a, 'p, T> {
    pub(crate) fn new(
        state: VisitState,
        depth: usize,
        lineage: Lineage<'a, 'p, T>,
        flags: VisitFlags,
    ) -> Self {
        Self {
            state,
            depth,
            lineage,
            flags,
        }
    }

    pub fn state(&self) -> VisitState {
        self.state
    }

    /// Distance from the root; the root is at depth 0.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Parent node, `None` for the root.
    pub fn parent(&self) -> Option<&'a Node<T>> {
        self.depth
            .checked_sub(1)
            .and_then(|i| self.lineage.get(i, self.depth))
    }

    /// The nodes from the root down to the parent. Yields `depth()` nodes,
    /// none for the root.
    pub fn ancestors(&self) -> Ancestors<'a, 'p, T> {
        Ancestors {
            lineage: self.lineage,
            len: self.depth,
            front: 0,
            back: self.depth,
        }
    }

    pub fn flags(&self) -> VisitFlags {
        self.flags
    }
}

impl<T> Clone for VisitContext<'_, '_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for VisitContext<'_, '_, T> {}

impl<T> fmt::Debug for VisitContext<'_, '_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisitContext")
            .field("state", &self.state)
            .field("depth", &self.depth)
            .field("flags", &self.flags)
            .finish()
    }
}

/// Iterator over a visited node's ancestors, see
/// [`VisitContext::ancestors`].
pub struct Ancestors<'a, 'p, T> {
    lineage: Lineage<'a, 'p, T>,
    len: usize,
    front: usize,
    back: usize,
}

impl<'a, T> Iterator for Ancestors<'a, '_, T> {
    type Item = &'a Node<T>;

    fn next(&mut self) -> Option<&'a Node<T>> {
        if self.front >= self.back {
            return None;
        }
        let node = self.lineage.get(self.front, self.len);
        self.front += 1;
        node
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.back - self.front;
        (left, Some(left))
    }
}

impl<'a, T> DoubleEndedIterator for Ancestors<'a, '_, T> {
    fn next_back(&mut self) -> Option<&'a Node<T>> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        self.lineage.get(self.back, self.len)
    }
}

impl<T> ExactSizeIterator for Ancestors<'_, '_, T> {}

/// What a finished visit did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct VisitSummary {
    /// Visitor calls.
    pub visited: usize,
    /// Nodes reached, including ones pruned from the report by range
    /// bounds.
    pub examined: usize,
    /// The visitor returned `Stop`.
    pub stopped: bool,
    /// Nodes at which the visit fanned out.
    pub forks: usize,
    /// Jobs started.
    pub jobs: usize,
    /// Child buffers merged into their parent's.
    pub merges: usize,
    /// Merge visits that ran in a single job because the tree exceeded the
    /// merge ceiling.
    pub merges_skipped: usize,
}

/// How a walk ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Finished,
    Stopped,
    Aborted,
}

impl Flow {
    /// Combines the outcomes of two branches; abort wins over stop.
    pub(crate) fn fold(self, other: Flow) -> Flow {
        match (self, other) {
            (Flow::Aborted, _) | (_, Flow::Aborted) => Flow::Aborted,
            (Flow::Stopped, _) | (_, Flow::Stopped) => Flow::Stopped,
            _ => Flow::Finished,
        }
    }

    pub(crate) fn into_summary(self, mut summary: VisitSummary) -> Result<VisitSummary> {
        match self {
            Flow::Aborted => Err(AvlError::VisitAborted),
            Flow::Stopped => {
                summary.stopped = true;
                Ok(summary)
            }
            Flow::Finished => Ok(summary),
        }
    }
}

/// Runs `visitor` over everything `walker` yields. Returns how the walk
/// ended and how many visitor calls were made.
///
/// `halt` lets a sibling branch of a parallel visit end this walk early.
pub(crate) fn drive<'a, T, C, F>(
    walker: &mut Walker<'a, T, C>,
    mut visitor: F,
    halt: Option<&AtomicBool>,
) -> (Flow, usize)
where
    C: Compare<T>,
    F: FnMut(&'a Node<T>, &VisitContext<'a, '_, T>) -> VisitAction,
{
    let mut calls = 0;
    while let Some((node, ctx)) = walker.next() {
        if halt.is_some_and(|h| h.load(Ordering::Acquire)) {
            return (Flow::Stopped, calls);
        }

        calls += 1;
        match visitor(node, &ctx) {
            VisitAction::Continue => {}
            VisitAction::Stop => return (Flow::Stopped, calls),
            VisitAction::Abort => return (Flow::Aborted, calls),
        }
    }
    (Flow::Finished, calls)
}

impl<T, C: Compare<T>> AvlTree<T, C> {
    /// Visits the tree in the calling thread.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `flags` select no order, mix breadth with
    ///   depth-first orders, or ask for a parallel visit
    /// - `VisitAborted` if the visitor returned [`VisitAction::Abort`]
    ///
    /// # Example
    ///
    /// ```
    /// use avlkit::{AvlTree, VisitAction, VisitFlags};
    ///
    /// let tree: AvlTree<u32> = (1..=7).collect();
    /// let mut seen = Vec::new();
    /// tree.visit(VisitFlags::PREFIX, |node, _| {
    ///     seen.push(*node.value());
    ///     VisitAction::Continue
    /// })
    /// .unwrap();
    /// assert_eq!(seen, vec![4, 2, 1, 3, 6, 5, 7]);
    /// ```
    pub fn visit<'a, F>(&'a self, flags: VisitFlags, visitor: F) -> Result<VisitSummary>
    where
        F: FnMut(&'a Node<T>, &VisitContext<'a, '_, T>) -> VisitAction,
    {
        flags.validate()?;
        if flags.contains(VisitFlags::PARALLEL) {
            return Err(AvlError::invalid(
                "parallel visits go through par_visit or par_visit_merge",
            ));
        }

        let mut walker = Walker::start(
            self.root(),
            Vec::new(),
            self.comparator(),
            flags,
            None,
            self.scratch(),
        );
        let (flow, visited) = drive(&mut walker, visitor, None);

        flow.into_summary(VisitSummary {
            visited,
            examined: walker.examined(),
            ..VisitSummary::default()
        })
    }

    /// Visits, in infix order, the values `v` with `min <= v <= max`.
    ///
    /// Subtrees that cannot hold such a value are never entered. `flags`
    /// may only add [`VisitFlags::RIGHT_TO_LEFT`], which reports the range
    /// from `max` down to `min`.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `min` sorts after `max` or `flags` holds
    ///   anything besides `RIGHT_TO_LEFT`
    /// - `VisitAborted` if the visitor aborted
    pub fn visit_range<'a, F>(
        &'a self,
        min: &'a T,
        max: &'a T,
        flags: VisitFlags,
        visitor: F,
    ) -> Result<VisitSummary>
    where
        F: FnMut(&'a Node<T>, &VisitContext<'a, '_, T>) -> VisitAction,
    {
        if !(flags - VisitFlags::RIGHT_TO_LEFT).is_empty() {
            return Err(AvlError::invalid(
                "range visits only accept the right-to-left flag",
            ));
        }
        if self.comparator().compare(min, max) == std::cmp::Ordering::Greater {
            return Err(AvlError::invalid("range minimum sorts after its maximum"));
        }

        let mut walker = Walker::start(
            self.root(),
            Vec::new(),
            self.comparator(),
            flags | VisitFlags::INFIX,
            Some(Bounds { min, max }),
            self.scratch(),
        );
        let (flow, visited) = drive(&mut walker, visitor, None);

        tracing::trace!(visited, examined = walker.examined(), "range visit done");
        flow.into_summary(VisitSummary {
            visited,
            examined: walker.examined(),
            ..VisitSummary::default()
        })
    }
}
