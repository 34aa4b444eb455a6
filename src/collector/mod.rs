use crate::error::{AvlError, Result};
use std::collections::VecDeque;

/// Append-only sequence used to gather visited values.
///
/// Items are pushed on top; they can be popped from the top (newest) or
/// dequeued from the bottom (oldest). A collector is either unbounded or
/// bounded; a bounded collector in overwrite mode behaves as a ring buffer
/// and silently drops its oldest entry when full.
#[derive(Debug, Clone)]
pub struct Collector<T> {
    items: VecDeque<T>,
    capacity: Option<usize>,
    overwrite: bool,
    dropped: u64,
}

impl<T> Collector<T> {
    /// Creates an unbounded collector.
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
            capacity: None,
            overwrite: false,
            dropped: 0,
        }
    }

    /// Creates a bounded collector.
    ///
    /// With `overwrite` set, pushing into a full collector drops the oldest
    /// entry; otherwise the push fails with `CollectorFull`.
    pub fn bounded(capacity: usize, overwrite: bool) -> Result<Self> {
        if capacity == 0 {
            return Err(AvlError::invalid("collector capacity must be at least 1"));
        }

        let mut items = VecDeque::new();
        items.try_reserve_exact(capacity)?;

        Ok(Self {
            items,
            capacity: Some(capacity),
            overwrite,
            dropped: 0,
        })
    }

    /// Shorthand for a bounded collector in overwrite mode.
    pub fn ring(capacity: usize) -> Result<Self> {
        Self::bounded(capacity, true)
    }

    /// Unbounded collector with room for `additional` items.
    pub fn with_capacity(additional: usize) -> Result<Self> {
        let mut collector = Self::new();
        collector.reserve(additional)?;
        Ok(collector)
    }

    pub fn push(&mut self, item: T) -> Result<()> {
        if let Some(capacity) = self.capacity {
            if self.items.len() >= capacity {
                if !self.overwrite {
                    return Err(AvlError::CollectorFull { capacity });
                }
                self.items.pop_front();
                self.dropped += 1;
            }
        } else if self.items.len() == self.items.capacity() {
            self.items.try_reserve(1)?;
        }

        self.items.push_back(item);
        Ok(())
    }

    /// Removes the newest item.
    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_back()
    }

    /// Removes the oldest item.
    pub fn dequeue(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Item at `index`, counted from the oldest.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Entries dropped by overwrite mode since creation or the last reset.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Empties the collector, keeping its capacity and mode.
    pub fn reset(&mut self) {
        self.items.clear();
        self.dropped = 0;
    }

    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        self.items.try_reserve(additional)?;
        Ok(())
    }

    /// Moves every item of `other` to the top of `self`.
    ///
    /// Order is preserved within `other`. Bounded collectors apply their
    /// usual full-collector rule per item.
    pub fn append(&mut self, other: Collector<T>) -> Result<()> {
        if self.capacity.is_none() {
            self.reserve(other.len())?;
            self.items.extend(other.items);
            return Ok(());
        }

        for item in other.items {
            self.push(item)?;
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items.into()
    }
}

impl<T> Default for Collector<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> IntoIterator for Collector<T> {
    type Item = T;
    type IntoIter = std::collections::vec_deque::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
