//! Bounded FIFO queue with a configurable overflow policy.
//!
//! Used twice by the lifecycle machine: once for publish requests issued
//! while offline, once for subscribe/unsubscribe requests. The publish queue
//! honors the caller-selected `DropBehavior`; the subscription-request queue
//! is always `Newest` (reject when full) with a fixed cap, because dropping
//! a subscription change silently would desynchronize the caller's view of
//! the subscription cache.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Overflow policy applied when a bounded queue is full at insertion time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropBehavior {
    /// Discard the oldest enqueued item to make room for the new one.
    Oldest,
    /// Reject the new item and leave the queue unchanged.
    Newest,
}

impl Default for DropBehavior {
    fn default() -> Self {
        Self::Oldest
    }
}

/// Generic FIFO queue with a maximum size and an overflow policy.
///
/// A capacity of `0` means unbounded. `enqueue` reports whether the item was
/// accepted; `dequeue` is non-blocking and returns `None` when empty.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    items: VecDeque<T>,
    capacity: usize,
    behavior: DropBehavior,
}

impl<T> BoundedQueue<T> {
    /// Creates a queue with the given capacity (0 = unbounded) and overflow
    /// policy.
    pub fn new(capacity: usize, behavior: DropBehavior) -> Self {
        Self {
            items: VecDeque::new(),
            capacity,
            behavior,
        }
    }

    /// Inserts an item at the tail.
    ///
    /// If the queue is at capacity, the overflow policy decides: `Oldest`
    /// discards the head before inserting, `Newest` drops the given item.
    /// Returns whether the item was accepted.
    pub fn enqueue(&mut self, item: T) -> bool {
        if self.capacity > 0 && self.items.len() >= self.capacity {
            match self.behavior {
                DropBehavior::Oldest => {
                    self.items.pop_front();
                }
                DropBehavior::Newest => return false,
            }
        }
        self.items.push_back(item);
        true
    }

    /// Removes and returns the head item, or `None` if the queue is empty.
    pub fn dequeue(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if no items are queued.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
