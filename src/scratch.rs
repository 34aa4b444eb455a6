//! Traversal stack storage that can be shared between trees.
//!
//! Every depth-first visit and every cursor needs a stack of frames. A
//! [`SharedScratch`] keeps the allocation of the last returned stack so the
//! next visit, on this tree or on any other tree holding the same handle,
//! starts with capacity already in place.
//!
//! Frames borrow the tree they walk, so a parked stack is kept empty and
//! retyped on the way in and out. Reuse of the allocation is best-effort:
//! when the frame layout of two trees differs the standard library simply
//! allocates a fresh buffer.
//!
//! The mutex is held only while a stack is lent or returned, never for the
//! duration of a visit. Visits that run while the slot is empty get a new
//! stack; correctness never depends on which one they get. Callers that
//! want the allocation reuse to be effective serialize their visits.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

/// Slot layout matching a `(&Node<T>, stage)` frame on common targets.
type Slot = [usize; 2];

#[derive(Debug, Default)]
struct ScratchStack {
    parked: Option<Vec<Slot>>,
    lends: u64,
    reuses: u64,
    peak_capacity: usize,
}

/// Counters describing how a [`SharedScratch`] has been used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ScratchStats {
    /// Stacks handed out.
    pub lends: u64,
    /// Lends served from a parked stack.
    pub reuses: u64,
    /// Largest capacity seen on return.
    pub peak_capacity: usize,
}

/// Handle to a traversal stack shared by any number of trees.
///
/// Cloning the handle shares the same underlying slot.
#[derive(Debug, Clone, Default)]
pub struct SharedScratch {
    inner: Arc<Mutex<ScratchStack>>,
}

impl SharedScratch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the parked stack, or a new one if none is parked.
    pub(crate) fn lend<F>(&self) -> Vec<F> {
        let mut inner = self.inner.lock();
        inner.lends += 1;
        let parked = inner.parked.take();
        match parked {
            Some(buf) => {
                inner.reuses += 1;
                tracing::trace!(capacity = buf.capacity(), "reusing shared traversal stack");
                retype(buf)
            }
            None => Vec::new(),
        }
    }

    /// Parks `buf` for the next visit. Keeps the larger of the two if a
    /// stack is already parked.
    pub(crate) fn restore<F>(&self, buf: Vec<F>) {
        let returned = buf.capacity();
        let buf: Vec<Slot> = retype(buf);
        let mut inner = self.inner.lock();
        inner.peak_capacity = inner.peak_capacity.max(returned);
        let keep = match &inner.parked {
            Some(parked) => buf.capacity() > parked.capacity(),
            None => true,
        };
        if keep {
            inner.parked = Some(buf);
        }
    }

    pub fn stats(&self) -> ScratchStats {
        let inner = self.inner.lock();
        ScratchStats {
            lends: inner.lends,
            reuses: inner.reuses,
            peak_capacity: inner.peak_capacity,
        }
    }

    /// Whether two handles refer to the same slot.
    pub fn ptr_eq(&self, other: &SharedScratch) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Empties `buf` and converts it to another element type, keeping the
/// allocation when the layouts agree.
fn retype<A, B>(mut buf: Vec<A>) -> Vec<B> {
    buf.clear();
    buf.into_iter().filter_map(|_| None).collect()
}
