//! Resumable traversal state machine shared by visits and cursors.

use super::{VisitContext, VisitFlags, VisitState};
use crate::scratch::SharedScratch;
use crate::tree::{Compare, Node};
use std::cmp::Ordering;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    /// Not yet descended.
    Enter,
    /// First child done.
    Between,
    /// Both children done.
    Leave,
}

pub(crate) struct Frame<'a, T> {
    node: &'a Node<T>,
    stage: Stage,
}

impl<T> Clone for Frame<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Frame<'_, T> {}

/// A node dequeued by a breadth walk and the index of its parent's entry.
pub(crate) struct Trail<'a, T> {
    node: &'a Node<T>,
    parent: Option<usize>,
}

impl<T> Clone for Trail<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Trail<'_, T> {}

/// The nodes above a visited node, borrowed from the walk that reached it.
///
/// Both forms start with `above`, the nodes over the walk's own root.
pub(crate) enum Lineage<'a, 'p, T> {
    /// Depth-first walks: the frames under the visited node's own frame.
    Stack {
        above: &'p [&'a Node<T>],
        frames: &'p [Frame<'a, T>],
    },
    /// Breadth walks: parent links through the trail.
    Trail {
        above: &'p [&'a Node<T>],
        trail: &'p [Trail<'a, T>],
        parent: Option<usize>,
    },
}

impl<'a, 'p, T> Lineage<'a, 'p, T> {
    /// A lineage that is exactly `path`, root first.
    pub(crate) fn path(path: &'p [&'a Node<T>]) -> Self {
        Lineage::Stack {
            above: path,
            frames: &[],
        }
    }

    /// Ancestor at `index` (0 is the root) of a node `len` levels deep.
    pub(crate) fn get(&self, index: usize, len: usize) -> Option<&'a Node<T>> {
        if index >= len {
            return None;
        }
        match *self {
            Lineage::Stack { above, frames } => match index.checked_sub(above.len()) {
                None => above.get(index).copied(),
                Some(i) => frames.get(i).map(|f| f.node),
            },
            Lineage::Trail {
                above,
                trail,
                parent,
            } => {
                if index < above.len() {
                    return above.get(index).copied();
                }
                let mut at = parent?;
                for _ in index + 1..len {
                    at = trail.get(at)?.parent?;
                }
                trail.get(at).map(|t| t.node)
            }
        }
    }
}

impl<T> Clone for Lineage<'_, '_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Lineage<'_, '_, T> {}

/// Inclusive bounds under the tree's comparator.
pub(crate) struct Bounds<'a, T> {
    pub(crate) min: &'a T,
    pub(crate) max: &'a T,
}

pub(crate) struct Walker<'a, T, C> {
    cmp: &'a C,
    flags: VisitFlags,
    bounds: Option<Bounds<'a, T>>,
    stack: Vec<Frame<'a, T>>,
    queue: VecDeque<(usize, usize)>,
    trail: Vec<Trail<'a, T>>,
    above: Vec<&'a Node<T>>,
    scratch: Option<SharedScratch>,
    examined: usize,
}

impl<'a, T, C: Compare<T>> Walker<'a, T, C> {
    /// Walker over the subtree at `root`. `above` holds the nodes between
    /// the tree's root and `root`, root first; it is empty for a whole-tree
    /// walk.
    pub(crate) fn start(
        root: Option<&'a Node<T>>,
        above: Vec<&'a Node<T>>,
        cmp: &'a C,
        flags: VisitFlags,
        bounds: Option<Bounds<'a, T>>,
        scratch: Option<&SharedScratch>,
    ) -> Self {
        let stack = match scratch {
            Some(scratch) => scratch.lend(),
            None => Vec::new(),
        };

        let mut walker = Self {
            cmp,
            flags,
            bounds,
            stack,
            queue: VecDeque::new(),
            trail: Vec::new(),
            above,
            scratch: scratch.cloned(),
            examined: 0,
        };

        if let Some(root) = root {
            if flags.contains(VisitFlags::BREADTH) {
                walker.trail.push(Trail {
                    node: root,
                    parent: None,
                });
                walker.queue.push_back((0, walker.above.len()));
            } else {
                walker.stack.push(Frame {
                    node: root,
                    stage: Stage::Enter,
                });
            }
            walker.examined = 1;
        }
        walker
    }

    /// Nodes entered so far, including ones never handed out because
    /// they fell outside the bounds.
    pub(crate) fn examined(&self) -> usize {
        self.examined
    }

    pub(crate) fn flags(&self) -> VisitFlags {
        self.flags
    }

    /// Next `(node, context)` in traversal order. The context borrows the
    /// walker's stack, so it lives until the next call.
    pub(crate) fn next(&mut self) -> Option<(&'a Node<T>, VisitContext<'a, '_, T>)> {
        if self.flags.contains(VisitFlags::BREADTH) {
            return self.next_breadth();
        }

        loop {
            let index = self.stack.len().checked_sub(1)?;
            let Frame { node, stage } = self.stack[index];

            let (emit, state) = match stage {
                Stage::Enter => {
                    self.stack[index].stage = Stage::Between;
                    let (first, _) = self.children(node);
                    self.descend(first);
                    (self.flags.contains(VisitFlags::PREFIX), VisitState::Prefix)
                }
                Stage::Between => {
                    self.stack[index].stage = Stage::Leave;
                    let (_, second) = self.children(node);
                    self.descend(second);
                    (self.flags.contains(VisitFlags::INFIX), VisitState::Infix)
                }
                Stage::Leave => {
                    self.stack.pop();
                    (self.flags.contains(VisitFlags::SUFFIX), VisitState::Suffix)
                }
            };

            if emit && self.in_range(node) {
                // Frames below `index` are exactly the node's ancestors in
                // every stage, since children sit above it and a popped
                // node leaves them untouched.
                let lineage = Lineage::Stack {
                    above: &self.above,
                    frames: &self.stack[..index],
                };
                let depth = self.above.len() + index;
                return Some((node, VisitContext::new(state, depth, lineage, self.flags)));
            }
        }
    }

    fn next_breadth(&mut self) -> Option<(&'a Node<T>, VisitContext<'a, '_, T>)> {
        while let Some((at, depth)) = self.queue.pop_front() {
            let Trail { node, parent } = self.trail[at];
            let (first, second) = self.children(node);
            for child in [first, second].into_iter().flatten() {
                self.trail.push(Trail {
                    node: child,
                    parent: Some(at),
                });
                self.queue.push_back((self.trail.len() - 1, depth + 1));
                self.examined += 1;
            }

            if self.in_range(node) {
                let lineage = Lineage::Trail {
                    above: &self.above,
                    trail: &self.trail,
                    parent,
                };
                return Some((
                    node,
                    VisitContext::new(VisitState::Breadth, depth, lineage, self.flags),
                ));
            }
        }
        None
    }

    fn descend(&mut self, child: Option<&'a Node<T>>) {
        if let Some(node) = child {
            self.stack.push(Frame {
                node,
                stage: Stage::Enter,
            });
            self.examined += 1;
        }
    }

    /// Children in visiting order, with subtrees that cannot hold an
    /// in-range value cut off.
    fn children(&self, node: &'a Node<T>) -> (Option<&'a Node<T>>, Option<&'a Node<T>>) {
        let mut left = node.left();
        let mut right = node.right();

        if let Some(bounds) = &self.bounds {
            // Equal values may sit on either side after rotations, so only
            // a strict comparison allows pruning.
            if self.cmp.compare(&node.value, bounds.min) == Ordering::Less {
                left = None;
            }
            if self.cmp.compare(&node.value, bounds.max) == Ordering::Greater {
                right = None;
            }
        }

        if self.flags.contains(VisitFlags::RIGHT_TO_LEFT) {
            (right, left)
        } else {
            (left, right)
        }
    }

    fn in_range(&self, node: &Node<T>) -> bool {
        match &self.bounds {
            None => true,
            Some(bounds) => {
                self.cmp.compare(&node.value, bounds.min) != Ordering::Less
                    && self.cmp.compare(&node.value, bounds.max) != Ordering::Greater
            }
        }
    }

    /// Drops remaining state and hands the stack back early.
    pub(crate) fn release(&mut self) {
        self.queue = VecDeque::new();
        self.trail = Vec::new();
        let stack = std::mem::take(&mut self.stack);
        if let Some(scratch) = &self.scratch {
            scratch.restore(stack);
        }
    }
}

impl<T, C> Drop for Walker<'_, T, C> {
    fn drop(&mut self) {
        if let Some(scratch) = self.scratch.take() {
            scratch.restore(std::mem::take(&mut self.stack));
        }
    }
}
