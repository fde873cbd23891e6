// src/bounded/mod.rs

//! A lock-based bounded blocking queue for many producers and many consumers.
//!
//! The queue holds at most `capacity` items in FIFO order. `enqueue` parks the
//! caller while the queue is full and `dequeue` parks it while the queue is
//! empty. Blocking and async callers can share one queue: a thread blocked in
//! `dequeue` is woken by an `enqueue_async().await` and the other way around.
//!
//! Waits can be bounded by a duration (`*_timeout`), by a [`CancelToken`]
//! (`*_cancellable`, or `cancel_on` for futures), or, for futures, by simply
//! dropping them. In every case an abandoned operation leaves the queue as it
//! found it.
//!
//! The queue is an ordinary value. Share it between producers and consumers
//! with an `Arc` (or scoped borrows); there is no global instance.

use crate::cancel::CancelToken;
use crate::config::QueueConfig;
use crate::error::{DequeueError, EnqueueError, QueueError, TryEnqueueError};

pub use async_impl::{DequeueFuture, EnqueueFuture, QueueStream};

mod async_impl;
mod core;
mod sync_impl;

use self::core::{Condition, QueueState};
use ::core::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

/// Advisory counters, read without taking the queue's lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStats {
  /// Items resident when the stats were read.
  pub len: usize,
  /// Items accepted since construction.
  pub enqueued: u64,
  /// Items handed out (or drained) since construction.
  pub dequeued: u64,
}

/// A bounded, thread-safe FIFO queue that blocks producers when full and
/// consumers when empty.
pub struct BoundedBlockingQueue<T> {
  state: Mutex<QueueState<T>>,
  capacity: usize,
  /// Mirror of the buffer length, stored under the lock after every mutation.
  /// Only `size()` and `stats()` read it; blocking decisions never do.
  len: AtomicUsize,
  enqueued: AtomicU64,
  dequeued: AtomicU64,
  name: Option<String>,
}

impl<T> fmt::Debug for BoundedBlockingQueue<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BoundedBlockingQueue")
      .field("name", &self.label())
      .field("capacity", &self.capacity())
      .field("len", &self.size())
      .finish_non_exhaustive()
  }
}

impl<T> Default for BoundedBlockingQueue<T> {
  fn default() -> Self {
    Self::unbounded()
  }
}

// --- Construction ---

impl<T> BoundedBlockingQueue<T> {
  /// Creates a queue holding at most `capacity` items.
  ///
  /// # Errors
  ///
  /// Returns [`QueueError::InvalidCapacity`] if `capacity` is zero.
  pub fn new(capacity: usize) -> Result<Self, QueueError> {
    if capacity == 0 {
      return Err(QueueError::InvalidCapacity { capacity });
    }
    Ok(Self::with_parts(capacity, None))
  }

  /// Creates a queue whose only bound is available memory.
  pub fn unbounded() -> Self {
    Self::with_parts(usize::MAX, None)
  }

  /// Creates a queue from a [`QueueConfig`].
  pub fn from_config(config: &QueueConfig) -> Result<Self, QueueError> {
    config.validate()?;
    Ok(Self::with_parts(config.effective_capacity(), config.name.clone()))
  }

  fn with_parts(capacity: usize, name: Option<String>) -> Self {
    let queue = BoundedBlockingQueue {
      state: Mutex::new(QueueState::new(capacity)),
      capacity,
      len: AtomicUsize::new(0),
      enqueued: AtomicU64::new(0),
      dequeued: AtomicU64::new(0),
      name,
    };
    debug!(queue = queue.label(), capacity = ?queue.capacity(), "queue created");
    queue
  }

  pub(crate) fn label(&self) -> &str {
    self.name.as_deref().unwrap_or("unnamed")
  }

  /// Publishes the length after a mutation. Must be called with the lock held.
  fn publish(&self, state: &QueueState<T>) {
    self.len.store(state.items.len(), Ordering::Release);
  }
}

// --- Blocking API ---

impl<T> BoundedBlockingQueue<T> {
  /// Appends `item` at the tail, blocking while the queue is full.
  pub fn enqueue(&self, item: T) {
    sync_impl::enqueue(self, item, None, None)
      .unwrap_or_else(|_| unreachable!("a wait without deadline or token cannot be abandoned"));
  }

  /// Appends `item` if it is present.
  ///
  /// `None` is rejected immediately, before any lock is taken, and the queue is
  /// left unchanged. `Some(item)` behaves like [`enqueue`](Self::enqueue).
  ///
  /// # Errors
  ///
  /// Returns [`QueueError::InvalidArgument`] for `None`.
  pub fn offer(&self, item: Option<T>) -> Result<(), QueueError> {
    let item = item.ok_or(QueueError::InvalidArgument)?;
    self.enqueue(item);
    Ok(())
  }

  /// Removes and returns the head item, blocking while the queue is empty.
  pub fn dequeue(&self) -> T {
    sync_impl::dequeue(self, None, None)
      .unwrap_or_else(|_| unreachable!("a wait without deadline or token cannot be abandoned"))
  }

  /// Like [`enqueue`](Self::enqueue), but gives up after `timeout`.
  ///
  /// # Errors
  ///
  /// Returns [`EnqueueError::Timeout`] with the item if no room appeared in time.
  pub fn enqueue_timeout(&self, item: T, timeout: Duration) -> Result<(), EnqueueError<T>> {
    sync_impl::enqueue(self, item, deadline_after(timeout), None)
  }

  /// Like [`dequeue`](Self::dequeue), but gives up after `timeout`.
  ///
  /// # Errors
  ///
  /// Returns [`DequeueError::Timeout`] if no item arrived in time.
  pub fn dequeue_timeout(&self, timeout: Duration) -> Result<T, DequeueError> {
    sync_impl::dequeue(self, deadline_after(timeout), None)
  }

  /// Like [`enqueue`](Self::enqueue), but returns early once `token` is cancelled.
  ///
  /// # Errors
  ///
  /// Returns [`EnqueueError::Cancelled`] with the item if the token fired before
  /// the item was accepted. A token that is already cancelled still lets the
  /// item through when there is room.
  pub fn enqueue_cancellable(&self, item: T, token: &CancelToken) -> Result<(), EnqueueError<T>> {
    sync_impl::enqueue(self, item, None, Some(token))
  }

  /// Like [`dequeue`](Self::dequeue), but returns early once `token` is cancelled.
  ///
  /// # Errors
  ///
  /// Returns [`DequeueError::Cancelled`] if the token fired before an item was taken.
  pub fn dequeue_cancellable(&self, token: &CancelToken) -> Result<T, DequeueError> {
    sync_impl::dequeue(self, None, Some(token))
  }

  /// Appends `item` only if there is room right now.
  pub fn try_enqueue(&self, item: T) -> Result<(), TryEnqueueError<T>> {
    let mut state = self.state.lock();
    if !state.is_satisfied(Condition::NotFull, self.capacity) {
      return Err(TryEnqueueError::Full(item));
    }
    self.commit_push(&mut state, item);
    Ok(())
  }

  /// Removes the head item only if one is present right now.
  pub fn try_dequeue(&self) -> Option<T> {
    let mut state = self.state.lock();
    self.commit_pop(&mut state)
  }

  fn commit_push(&self, state: &mut QueueState<T>, item: T) {
    state.push(item, self.capacity);
    self.publish(state);
    self.enqueued.fetch_add(1, Ordering::Relaxed);
  }

  fn commit_pop(&self, state: &mut QueueState<T>) -> Option<T> {
    let item = state.pop(self.capacity)?;
    self.publish(state);
    self.dequeued.fetch_add(1, Ordering::Relaxed);
    Some(item)
  }
}

// --- Async API ---

impl<T> BoundedBlockingQueue<T> {
  /// Returns a future that appends `item` once there is room.
  ///
  /// Dropping the future before it completes cancels the operation; the item
  /// is dropped with it and the queue is unchanged.
  ///
  /// Once a free slot has woken the future, that slot is reserved for it until
  /// the future is polled again or dropped. Other producers parked behind it,
  /// blocking ones included, keep waiting in the meantime, so a woken future
  /// should not be left idle.
  pub fn enqueue_async(&self, item: T) -> EnqueueFuture<'_, T> {
    EnqueueFuture::new(self, item)
  }

  /// Returns a future that resolves to the head item once one is present.
  ///
  /// Dropping the future before it completes cancels the operation.
  ///
  /// Once an item has woken the future, that item is reserved for it until the
  /// future is polled again or dropped, and consumers parked behind it keep
  /// waiting even though the queue is not empty. The same applies to
  /// [`stream`](Self::stream).
  pub fn dequeue_async(&self) -> DequeueFuture<'_, T> {
    DequeueFuture::new(self)
  }

  /// Returns a `Stream` that dequeues items forever.
  pub fn stream(&self) -> QueueStream<'_, T> {
    QueueStream::new(self)
  }
}

// --- Inspection ---

impl<T> BoundedBlockingQueue<T> {
  /// Returns the number of resident items.
  ///
  /// This never blocks. The value is a snapshot that concurrent operations
  /// may invalidate immediately; it always lies within `0..=capacity`.
  #[inline]
  pub fn size(&self) -> usize {
    self.len.load(Ordering::Acquire)
  }

  /// Alias for [`size`](Self::size).
  #[inline]
  pub fn len(&self) -> usize {
    self.size()
  }

  /// Returns `true` if no items are resident.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.size() == 0
  }

  /// Returns `true` if the queue holds `capacity` items.
  /// For unbounded queues this is always `false`.
  #[inline]
  pub fn is_full(&self) -> bool {
    self.capacity != usize::MAX && self.size() == self.capacity
  }

  /// Returns the capacity of the queue. `None` for unbounded queues.
  pub fn capacity(&self) -> Option<usize> {
    if self.capacity == usize::MAX {
      None
    } else {
      Some(self.capacity)
    }
  }

  /// Returns the advisory counters.
  pub fn stats(&self) -> QueueStats {
    QueueStats {
      len: self.size(),
      enqueued: self.enqueued.load(Ordering::Relaxed),
      dequeued: self.dequeued.load(Ordering::Relaxed),
    }
  }

  /// Removes every resident item, in FIFO order, and wakes blocked producers.
  pub fn drain(&self) -> Vec<T> {
    let drained: Vec<T> = {
      let mut state = self.state.lock();
      let items = state.take_all(self.capacity);
      self.publish(&state);
      items.into()
    };
    self.dequeued.fetch_add(drained.len() as u64, Ordering::Relaxed);
    drained
  }

  /// Removes every resident item for which `keep` returns `false`, wherever
  /// it sits in the queue, and wakes as many blocked producers as slots were
  /// freed. The remaining items keep their order.
  ///
  /// `keep` runs with the queue locked, so it must not call back into the
  /// queue. Returns the number of items removed.
  pub fn retain<F>(&self, keep: F) -> usize
  where
    F: FnMut(&T) -> bool,
  {
    let removed = {
      let mut state = self.state.lock();
      let removed = state.retain(keep, self.capacity);
      self.publish(&state);
      removed
    };
    if removed > 0 {
      self.dequeued.fetch_add(removed as u64, Ordering::Relaxed);
      debug!(queue = self.label(), removed, "items removed in place");
    }
    removed
  }
}

impl<T: Clone> BoundedBlockingQueue<T> {
  /// Returns a copy of the resident items, head first, as of one instant.
  pub fn snapshot(&self) -> Vec<T> {
    self.state.lock().items.iter().cloned().collect()
  }
}

/// `None` when the deadline is not representable; such a wait never times out.
fn deadline_after(timeout: Duration) -> Option<Instant> {
  Instant::now().checked_add(timeout)
}
