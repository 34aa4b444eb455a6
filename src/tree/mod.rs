//! AVL tree storage.
//!
//! [`AvlTree`] owns its nodes through `Box` links. Rebalancing happens
//! bottom-up on the way back from every insert and remove, using the
//! balance factor stored in each node.

mod audit;
mod node;

pub use audit::AuditReport;
pub use node::Node;

pub(crate) use node::Link;

use crate::config::{InsertPolicy, TreeConfig};
use crate::error::{AvlError, Result};
use crate::scratch::SharedScratch;
use node::Placement;
use std::cmp::Ordering;
use std::fmt;

/// Total order over stored values.
pub trait Compare<T> {
    fn compare(&self, a: &T, b: &T) -> Ordering;
}

/// Orders values by their [`Ord`] implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaturalOrder;

impl<T: Ord> Compare<T> for NaturalOrder {
    fn compare(&self, a: &T, b: &T) -> Ordering {
        a.cmp(b)
    }
}

impl<T, F> Compare<T> for F
where
    F: Fn(&T, &T) -> Ordering,
{
    fn compare(&self, a: &T, b: &T) -> Ordering {
        self(a, b)
    }
}

/// Result of a successful [`AvlTree::insert`].
#[derive(Debug, PartialEq, Eq)]
pub enum InsertOutcome<'a, T> {
    /// A new node was created.
    Inserted,
    /// An equal value was already stored (`ReturnExisting` policy). The tree
    /// is unchanged and the offered value is handed back.
    Existing { existing: &'a T, offered: T },
    /// The stored equal value was overwritten (`Replace` policy); this is
    /// the previous value.
    Replaced(T),
}

impl<T> InsertOutcome<'_, T> {
    pub fn is_inserted(&self) -> bool {
        matches!(self, InsertOutcome::Inserted)
    }
}

/// Self-balancing ordered tree.
///
/// # Example
///
/// ```
/// use avlkit::AvlTree;
///
/// let mut tree = AvlTree::new();
/// for v in [2, 9, 4, 5, 8, 3, 6, 1, 7, 4, 1] {
///     tree.insert(v).unwrap();
/// }
///
/// assert_eq!(tree.len(), 11);
/// assert_eq!(*tree.find_min().unwrap(), 1);
/// assert_eq!(tree.iter().copied().collect::<Vec<_>>(), vec![1, 1, 2, 3, 4, 4, 5, 6, 7, 8, 9]);
/// ```
pub struct AvlTree<T, C = NaturalOrder> {
    root: Link<T>,
    cmp: C,
    len: usize,
    config: TreeConfig,
    scratch: Option<SharedScratch>,
}

impl<T: Ord> AvlTree<T> {
    /// Empty tree using `T`'s natural order and the default configuration.
    pub fn new() -> Self {
        Self::with_comparator(NaturalOrder)
    }
}

impl<T: Ord> Default for AvlTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord> FromIterator<T> for AvlTree<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut tree = AvlTree::new();
        for value in iter {
            // The default policy accepts every value.
            let _ = tree.insert(value);
        }
        tree
    }
}

impl<T, C: Compare<T>> AvlTree<T, C> {
    /// Empty tree ordered by `cmp`, default configuration.
    pub fn with_comparator(cmp: C) -> Self {
        Self {
            root: None,
            cmp,
            len: 0,
            config: TreeConfig::default(),
            scratch: None,
        }
    }

    /// Empty tree ordered by `cmp`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `config` fails validation.
    pub fn with_config(cmp: C, config: TreeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            root: None,
            cmp,
            len: 0,
            config,
            scratch: None,
        })
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn policy(&self) -> InsertPolicy {
        self.config.policy
    }

    /// Switches the duplicate policy for subsequent inserts.
    pub fn set_policy(&mut self, policy: InsertPolicy) {
        self.config.policy = policy;
    }

    pub fn comparator(&self) -> &C {
        &self.cmp
    }

    /// Makes this tree draw its traversal stacks from `scratch`.
    pub fn share_scratch(&mut self, scratch: &SharedScratch) {
        self.scratch = Some(scratch.clone());
    }

    pub fn scratch(&self) -> Option<&SharedScratch> {
        self.scratch.as_ref()
    }

    pub fn root(&self) -> Option<&Node<T>> {
        self.root.as_deref()
    }

    /// Inserts `value` according to the tree's [`InsertPolicy`].
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` under `RejectError` when an equal value is
    /// stored; the tree is left unchanged.
    pub fn insert(&mut self, value: T) -> Result<InsertOutcome<'_, T>> {
        let cmp = &self.cmp;
        let (placement, _) = node::insert(
            &mut self.root,
            value,
            &|a: &T, b: &T| cmp.compare(a, b),
            self.config.policy,
        )?;

        match placement {
            Placement::Inserted => {
                self.len += 1;
                Ok(InsertOutcome::Inserted)
            }
            Placement::Replaced(old) => Ok(InsertOutcome::Replaced(old)),
            Placement::Existing(offered) => {
                let existing = self.find(&offered).ok_or(AvlError::NotFound)?;
                Ok(InsertOutcome::Existing { existing, offered })
            }
        }
    }

    /// Removes one value equal to `key` and returns it.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no equal value is stored.
    pub fn remove(&mut self, key: &T) -> Result<T> {
        let cmp = &self.cmp;
        let (value, _) = node::remove(&mut self.root, &|v: &T| cmp.compare(key, v))
            .ok_or(AvlError::NotFound)?;
        self.len -= 1;
        Ok(value)
    }

    /// Removes the first value for which `probe` returns `Equal`.
    ///
    /// `probe` tells where the wanted value lies relative to the value it is
    /// shown, which allows removal by a partial key.
    pub fn remove_by<P>(&mut self, probe: P) -> Result<T>
    where
        P: Fn(&T) -> Ordering,
    {
        let (value, _) = node::remove(&mut self.root, &probe).ok_or(AvlError::NotFound)?;
        self.len -= 1;
        Ok(value)
    }

    pub fn find(&self, key: &T) -> Option<&T> {
        self.find_by(|v| self.cmp.compare(key, v))
    }

    /// Looks a value up with a probe, see [`remove_by`](Self::remove_by).
    pub fn find_by<P>(&self, probe: P) -> Option<&T>
    where
        P: Fn(&T) -> Ordering,
    {
        let mut cursor = self.root.as_deref();
        while let Some(node) = cursor {
            cursor = match probe(&node.value) {
                Ordering::Less => node.left(),
                Ordering::Greater => node.right(),
                Ordering::Equal => return Some(&node.value),
            };
        }
        None
    }

    pub fn contains(&self, key: &T) -> bool {
        self.find(key).is_some()
    }

    /// Smallest value.
    ///
    /// # Errors
    ///
    /// Returns `EmptyTree` when the tree has no nodes.
    pub fn find_min(&self) -> Result<&T> {
        let mut node = self.root.as_deref().ok_or(AvlError::EmptyTree)?;
        while let Some(left) = node.left() {
            node = left;
        }
        Ok(&node.value)
    }

    /// Largest value.
    ///
    /// # Errors
    ///
    /// Returns `EmptyTree` when the tree has no nodes.
    pub fn find_max(&self) -> Result<&T> {
        let mut node = self.root.as_deref().ok_or(AvlError::EmptyTree)?;
        while let Some(right) = node.right() {
            node = right;
        }
        Ok(&node.value)
    }

    /// Removes and returns the smallest value.
    pub fn pop_min(&mut self) -> Result<T> {
        let (value, _) = node::remove_min(&mut self.root).ok_or(AvlError::EmptyTree)?;
        self.len -= 1;
        Ok(value)
    }

    /// Removes and returns the largest value.
    pub fn pop_max(&mut self) -> Result<T> {
        let (value, _) = node::remove_max(&mut self.root).ok_or(AvlError::EmptyTree)?;
        self.len -= 1;
        Ok(value)
    }

    /// Drops every node.
    pub fn clear(&mut self) {
        self.root = None;
        self.len = 0;
    }
}

impl<T, C> AvlTree<T, C> {
    /// Number of stored values, duplicates included.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Height of the tree; 0 when empty.
    pub fn depth(&self) -> usize {
        self.root.as_deref().map_or(0, Node::height)
    }

    /// Bytes held by the tree structure itself (not by heap data the
    /// values may own).
    pub fn memory_footprint(&self) -> usize {
        std::mem::size_of::<Self>() + self.len * std::mem::size_of::<Node<T>>()
    }
}

impl<T: fmt::Debug, C: Compare<T>> fmt::Debug for AvlTree<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AvlTree")?;
        f.debug_list().entries(self.iter()).finish()
    }
}
