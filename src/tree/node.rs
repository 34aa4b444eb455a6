use crate::config::InsertPolicy;
use crate::error::{AvlError, Result};
use std::cmp::Ordering;
use std::mem;

pub(crate) type Link<T> = Option<Box<Node<T>>>;

/// A tree node.
///
/// `balance` is `height(right) - height(left)` and stays within `-1..=1`
/// between public operations.
#[derive(Debug, Clone)]
pub struct Node<T> {
    pub(crate) value: T,
    pub(crate) left: Link<T>,
    pub(crate) right: Link<T>,
    pub(crate) balance: i8,
}

impl<T> Node<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            value,
            left: None,
            right: None,
            balance: 0,
        }
    }

    /// Stored value.
    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn left(&self) -> Option<&Node<T>> {
        self.left.as_deref()
    }

    pub fn right(&self) -> Option<&Node<T>> {
        self.right.as_deref()
    }

    /// Stored balance factor, `height(right) - height(left)`.
    pub fn balance(&self) -> i8 {
        self.balance
    }

    /// Height of the subtree rooted here (a leaf has height 1).
    ///
    /// Follows the taller side recorded in the balance factor, so this is
    /// `O(log n)` on a balanced tree.
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut cursor = Some(self);
        while let Some(node) = cursor {
            height += 1;
            cursor = if node.balance < 0 {
                node.left()
            } else {
                node.right()
            };
        }
        height
    }

    /// Children in visiting order: `(first, second)`.
    pub(crate) fn children(&self, right_to_left: bool) -> (Option<&Node<T>>, Option<&Node<T>>) {
        if right_to_left {
            (self.right(), self.left())
        } else {
            (self.left(), self.right())
        }
    }
}

/// What a structural insert did.
pub(crate) enum Placement<T> {
    Inserted,
    /// The offered value, handed back untouched.
    Existing(T),
    /// The value that was overwritten.
    Replaced(T),
}

//    a(b(x, y), z)   =>   b(x, a(y, z))
fn rotate_right<T>(root: &mut Box<Node<T>>) {
    let Some(mut pivot) = root.left.take() else {
        return;
    };
    root.left = pivot.right.take();
    mem::swap(root, &mut pivot);
    root.right = Some(pivot);
}

//    a(x, b(y, z))   =>   b(a(x, y), z)
fn rotate_left<T>(root: &mut Box<Node<T>>) {
    let Some(mut pivot) = root.right.take() else {
        return;
    };
    root.right = pivot.left.take();
    mem::swap(root, &mut pivot);
    root.left = Some(pivot);
}

/// Restores a node whose balance reached -2. Returns true if the subtree
/// got shorter than it was while unbalanced.
fn fix_left_heavy<T>(root: &mut Box<Node<T>>) -> bool {
    let Some(left_balance) = root.left.as_ref().map(|l| l.balance) else {
        return false;
    };

    if left_balance <= 0 {
        tracing::trace!("single right rotation");
        rotate_right(root);
        let (top, lowered) = if left_balance == 0 { (1, -1) } else { (0, 0) };
        root.balance = top;
        if let Some(right) = root.right.as_mut() {
            right.balance = lowered;
        }
        left_balance != 0
    } else {
        tracing::trace!("left-right double rotation");
        let grandchild = root
            .left
            .as_ref()
            .and_then(|l| l.right.as_ref())
            .map_or(0, |g| g.balance);
        if let Some(left) = root.left.as_mut() {
            rotate_left(left);
        }
        rotate_right(root);
        root.balance = 0;
        if let Some(left) = root.left.as_mut() {
            left.balance = if grandchild == 1 { -1 } else { 0 };
        }
        if let Some(right) = root.right.as_mut() {
            right.balance = if grandchild == -1 { 1 } else { 0 };
        }
        true
    }
}

/// Mirror of [`fix_left_heavy`] for a balance of +2.
fn fix_right_heavy<T>(root: &mut Box<Node<T>>) -> bool {
    let Some(right_balance) = root.right.as_ref().map(|r| r.balance) else {
        return false;
    };

    if right_balance >= 0 {
        tracing::trace!("single left rotation");
        rotate_left(root);
        let (top, lowered) = if right_balance == 0 { (-1, 1) } else { (0, 0) };
        root.balance = top;
        if let Some(left) = root.left.as_mut() {
            left.balance = lowered;
        }
        right_balance != 0
    } else {
        tracing::trace!("right-left double rotation");
        let grandchild = root
            .right
            .as_ref()
            .and_then(|r| r.left.as_ref())
            .map_or(0, |g| g.balance);
        if let Some(right) = root.right.as_mut() {
            rotate_right(right);
        }
        rotate_left(root);
        root.balance = 0;
        if let Some(left) = root.left.as_mut() {
            left.balance = if grandchild == 1 { -1 } else { 0 };
        }
        if let Some(right) = root.right.as_mut() {
            right.balance = if grandchild == -1 { 1 } else { 0 };
        }
        true
    }
}

/// Left subtree grew by one. Returns whether this subtree grew.
fn left_grew<T>(node: &mut Box<Node<T>>) -> bool {
    node.balance -= 1;
    match node.balance {
        0 => false,
        -1 => true,
        _ => {
            fix_left_heavy(node);
            false
        }
    }
}

fn right_grew<T>(node: &mut Box<Node<T>>) -> bool {
    node.balance += 1;
    match node.balance {
        0 => false,
        1 => true,
        _ => {
            fix_right_heavy(node);
            false
        }
    }
}

/// Left subtree shrank by one. Returns whether this subtree shrank.
fn left_shrank<T>(node: &mut Box<Node<T>>) -> bool {
    node.balance += 1;
    match node.balance {
        0 => true,
        1 => false,
        _ => fix_right_heavy(node),
    }
}

fn right_shrank<T>(node: &mut Box<Node<T>>) -> bool {
    node.balance -= 1;
    match node.balance {
        0 => true,
        -1 => false,
        _ => fix_left_heavy(node),
    }
}

/// Inserts below `link`. The bool is true when the subtree got taller.
pub(crate) fn insert<T, F>(
    link: &mut Link<T>,
    value: T,
    cmp: &F,
    policy: InsertPolicy,
) -> Result<(Placement<T>, bool)>
where
    F: Fn(&T, &T) -> Ordering,
{
    match link {
        None => {
            *link = Some(Box::new(Node::new(value)));
            Ok((Placement::Inserted, true))
        }
        Some(node) => {
            let go_left = match cmp(&value, &node.value) {
                Ordering::Less => true,
                Ordering::Greater => false,
                Ordering::Equal => match policy {
                    InsertPolicy::AllowDuplicates => true,
                    InsertPolicy::RejectError => return Err(AvlError::AlreadyExists),
                    InsertPolicy::ReturnExisting => {
                        return Ok((Placement::Existing(value), false));
                    }
                    InsertPolicy::Replace => {
                        let old = mem::replace(&mut node.value, value);
                        return Ok((Placement::Replaced(old), false));
                    }
                },
            };

            if go_left {
                let (placement, grew) = insert(&mut node.left, value, cmp, policy)?;
                Ok((placement, grew && left_grew(node)))
            } else {
                let (placement, grew) = insert(&mut node.right, value, cmp, policy)?;
                Ok((placement, grew && right_grew(node)))
            }
        }
    }
}

/// Removes the first node for which `probe` returns `Equal`.
///
/// `probe` reports where the wanted value lies relative to the node it is
/// given. The bool is true when the subtree got shorter.
pub(crate) fn remove<T, P>(link: &mut Link<T>, probe: &P) -> Option<(T, bool)>
where
    P: Fn(&T) -> Ordering,
{
    let node = link.as_mut()?;

    match probe(&node.value) {
        Ordering::Less => {
            let (value, shrank) = remove(&mut node.left, probe)?;
            Some((value, shrank && left_shrank(node)))
        }
        Ordering::Greater => {
            let (value, shrank) = remove(&mut node.right, probe)?;
            Some((value, shrank && right_shrank(node)))
        }
        Ordering::Equal => unlink(link),
    }
}

/// Removes the node at `link`. A node with two children takes over its
/// in-order predecessor (left-heavy) or successor (otherwise).
fn unlink<T>(link: &mut Link<T>) -> Option<(T, bool)> {
    let node = link.as_mut()?;

    if node.left.is_some() && node.right.is_some() {
        if node.balance < 0 {
            let (promoted, shrank) = remove_max(&mut node.left)?;
            let removed = mem::replace(&mut node.value, promoted);
            return Some((removed, shrank && left_shrank(node)));
        }
        let (promoted, shrank) = remove_min(&mut node.right)?;
        let removed = mem::replace(&mut node.value, promoted);
        return Some((removed, shrank && right_shrank(node)));
    }

    let mut node = link.take()?;
    *link = node.left.take().or_else(|| node.right.take());
    Some((node.value, true))
}

/// Removes the leftmost node below `link`.
pub(crate) fn remove_min<T>(link: &mut Link<T>) -> Option<(T, bool)> {
    let node = link.as_mut()?;

    if node.left.is_some() {
        let (value, shrank) = remove_min(&mut node.left)?;
        return Some((value, shrank && left_shrank(node)));
    }

    let mut node = link.take()?;
    *link = node.right.take();
    Some((node.value, true))
}

/// Removes the rightmost node below `link`.
pub(crate) fn remove_max<T>(link: &mut Link<T>) -> Option<(T, bool)> {
    let node = link.as_mut()?;

    if node.right.is_some() {
        let (value, shrank) = remove_max(&mut node.right)?;
        return Some((value, shrank && right_shrank(node)));
    }

    let mut node = link.take()?;
    *link = node.left.take();
    Some((node.value, true))
}
