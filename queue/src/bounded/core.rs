// src/bounded/core.rs

//! The mutex-protected state of the queue.
//!
//! ### Design Principles:
//!
//! 1.  **Single critical section**: one `parking_lot::Mutex` guards the buffer and
//!     both wait conditions, so the occupancy seen by a blocking decision is
//!     always the buffer length itself.
//! 2.  **Two wait conditions**: producers park on `not_full`, consumers on
//!     `not_empty`. Sync threads and async tasks share the same lists, which is
//!     what lets a blocking producer feed an async consumer and vice versa.
//! 3.  **Signal on the new state**: after every mutation both conditions are
//!     signaled against the resource that now exists (`len` items, `capacity - len`
//!     free slots). A consumer that takes an item while more remain therefore
//!     cascades the wake to the next consumer, and a waiter that abandons a
//!     signal hands it on through the same call.

use std::collections::VecDeque;

use crate::internal::WaitList;

/// Which side of the queue a waiter is blocked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Condition {
  /// A producer waiting for a free slot.
  NotFull,
  /// A consumer waiting for an item.
  NotEmpty,
}

/// Why a wait ended without its condition being met.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Abandon {
  Cancelled,
  TimedOut,
}

#[derive(Debug)]
pub(crate) struct QueueState<T> {
  pub(crate) items: VecDeque<T>,
  pub(crate) not_full: WaitList,
  pub(crate) not_empty: WaitList,
}

impl<T> QueueState<T> {
  pub(crate) fn new(capacity: usize) -> Self {
    QueueState {
      items: VecDeque::with_capacity(if capacity == usize::MAX { 32 } else { capacity.min(1024) }),
      not_full: WaitList::new(),
      not_empty: WaitList::new(),
    }
  }

  pub(crate) fn waiters(&mut self, condition: Condition) -> &mut WaitList {
    match condition {
      Condition::NotFull => &mut self.not_full,
      Condition::NotEmpty => &mut self.not_empty,
    }
  }

  pub(crate) fn is_satisfied(&self, condition: Condition, capacity: usize) -> bool {
    match condition {
      Condition::NotFull => self.items.len() < capacity,
      Condition::NotEmpty => !self.items.is_empty(),
    }
  }

  /// Appends an item. The caller has established that there is room.
  pub(crate) fn push(&mut self, item: T, capacity: usize) {
    debug_assert!(self.items.len() < capacity, "push into a full queue");
    self.items.push_back(item);
    self.resignal(capacity);
  }

  /// Removes the head item, if any.
  pub(crate) fn pop(&mut self, capacity: usize) -> Option<T> {
    let item = self.items.pop_front()?;
    self.resignal(capacity);
    Some(item)
  }

  /// Removes every resident item.
  pub(crate) fn take_all(&mut self, capacity: usize) -> VecDeque<T> {
    let items = std::mem::take(&mut self.items);
    self.resignal(capacity);
    items
  }

  /// Keeps only the items `keep` accepts, preserving their order.
  ///
  /// Returns the number of items removed.
  pub(crate) fn retain<F>(&mut self, mut keep: F, capacity: usize) -> usize
  where
    F: FnMut(&T) -> bool,
  {
    let before = self.items.len();
    self.items.retain(|item| keep(item));
    let removed = before - self.items.len();
    if removed > 0 {
      self.resignal(capacity);
    }
    removed
  }

  /// Signals both conditions against the current state.
  ///
  /// Returns the number of waiters woken.
  pub(crate) fn resignal(&mut self, capacity: usize) -> usize {
    let len = self.items.len();
    self.not_empty.signal(len) + self.not_full.signal(capacity - len)
  }
}
