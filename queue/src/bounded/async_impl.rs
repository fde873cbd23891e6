// src/bounded/async_impl.rs
//! Implementation of the asynchronous Future-based enqueue and dequeue logic.
//!
//! Async waiters park in the same wait lists as blocking threads. A future that
//! is dropped while parked removes its registration, and if it had already been
//! signaled it passes the wake on, so dropping a future (for example when it
//! loses a `select!` or hits a `tokio::time::timeout`) never strands another
//! waiter.

use futures_core::Stream;

use super::core::{Abandon, Condition, QueueState};
use super::BoundedBlockingQueue;
use crate::cancel::{CancelToken, CancelWatch};
use crate::error::{DequeueError, EnqueueError};
use crate::internal::{WaitKey, WakeHandle};

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use parking_lot::MutexGuard;
use tracing::{debug, trace};

/// Registration state shared by both futures.
#[derive(Debug, Default)]
struct AsyncWait<'a> {
  key: Option<WaitKey>,
  token: Option<&'a CancelToken>,
  watch: Option<CancelWatch<'a>>,
}

impl<'a> AsyncWait<'a> {
  fn poll_ready<'q, T>(
    &mut self,
    queue: &'q BoundedBlockingQueue<T>,
    condition: Condition,
    cx: &mut Context<'_>,
  ) -> Poll<Result<MutexGuard<'q, QueueState<T>>, Abandon>> {
    // Keep the token's copy of our waker current before looking at the flag.
    if let Some(token) = self.token {
      match &self.watch {
        Some(watch) => watch.refresh(cx.waker()),
        None => self.watch = Some(token.watch(WakeHandle::Async(cx.waker().clone()))),
      }
    }

    let mut state = queue.state.lock();

    // --- Phase 1: Resolve the previous wake-up ---
    if let Some(key) = self.key {
      if state.waiters(condition).claim(key) {
        self.key = None;
      }
    }

    // --- Phase 2: Check the condition ---
    if self.key.is_none() && state.is_satisfied(condition, queue.capacity) {
      self.watch = None;
      return Poll::Ready(Ok(state));
    }

    if self.token.is_some_and(CancelToken::is_cancelled) {
      if let Some(key) = self.key.take() {
        state.waiters(condition).abandon(key);
      }
      let passed_on = state.resignal(queue.capacity);
      debug!(queue = queue.label(), ?condition, passed_on, "async operation cancelled");
      self.watch = None;
      return Poll::Ready(Err(Abandon::Cancelled));
    }

    // --- Phase 3: Park ---
    match self.key {
      Some(key) => state.waiters(condition).refresh(key, cx.waker()),
      None => {
        self.key = Some(state.waiters(condition).register(WakeHandle::Async(cx.waker().clone())));
        trace!(queue = queue.label(), ?condition, len = state.items.len(), "async waiter parked");
      }
    }
    Poll::Pending
  }

  /// Withdraws a pending registration, handing on a signal it may hold.
  fn release<T>(&mut self, queue: &BoundedBlockingQueue<T>, condition: Condition) {
    let Some(key) = self.key.take() else {
      return;
    };
    let mut state = queue.state.lock();
    if state.waiters(condition).abandon(key) {
      let passed_on = state.resignal(queue.capacity);
      trace!(queue = queue.label(), ?condition, passed_on, "dropped waiter passed its wake on");
    }
  }
}

// --- EnqueueFuture ---

/// A future that completes when an item has been appended to the queue.
#[must_use = "futures do nothing unless you .await or poll them"]
pub struct EnqueueFuture<'a, T> {
  queue: &'a BoundedBlockingQueue<T>,
  // The item is wrapped in an Option so it can be taken during the poll.
  item: Option<T>,
  wait: AsyncWait<'a>,
  completed: bool,
}

// The item is never pinned structurally; it is only moved into the queue.
impl<T> Unpin for EnqueueFuture<'_, T> {}

impl<T> fmt::Debug for EnqueueFuture<'_, T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("EnqueueFuture")
      .field("queue", &self.queue.label())
      .field("pending", &self.item.is_some())
      .field("parked", &self.wait.key.is_some())
      .field("completed", &self.completed)
      .finish()
  }
}

impl<'a, T> EnqueueFuture<'a, T> {
  pub(super) fn new(queue: &'a BoundedBlockingQueue<T>, item: T) -> Self {
    Self {
      queue,
      item: Some(item),
      wait: AsyncWait::default(),
      completed: false,
    }
  }

  /// Makes the future resolve to [`EnqueueError::Cancelled`] once `token` is
  /// cancelled while it is still waiting for room.
  pub fn cancel_on(mut self, token: &'a CancelToken) -> Self {
    self.wait.token = Some(token);
    self
  }
}

impl<T> Future for EnqueueFuture<'_, T> {
  type Output = Result<(), EnqueueError<T>>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let this = self.get_mut();
    assert!(!this.completed, "EnqueueFuture polled after completion");
    let Some(item) = this.item.take() else {
      unreachable!("pending EnqueueFuture without an item");
    };

    match this.wait.poll_ready(this.queue, Condition::NotFull, cx) {
      Poll::Ready(Ok(mut state)) => {
        this.completed = true;
        this.queue.commit_push(&mut state, item);
        Poll::Ready(Ok(()))
      }
      Poll::Ready(Err(_)) => {
        this.completed = true;
        Poll::Ready(Err(EnqueueError::Cancelled(item)))
      }
      Poll::Pending => {
        this.item = Some(item);
        Poll::Pending
      }
    }
  }
}

impl<T> Drop for EnqueueFuture<'_, T> {
  fn drop(&mut self) {
    self.wait.release(self.queue, Condition::NotFull);
  }
}

// --- DequeueFuture ---

/// A future that resolves to the head item of the queue.
#[must_use = "futures do nothing unless you .await or poll them"]
pub struct DequeueFuture<'a, T> {
  queue: &'a BoundedBlockingQueue<T>,
  wait: AsyncWait<'a>,
  completed: bool,
}

impl<T> fmt::Debug for DequeueFuture<'_, T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("DequeueFuture")
      .field("queue", &self.queue.label())
      .field("parked", &self.wait.key.is_some())
      .field("completed", &self.completed)
      .finish()
  }
}

impl<'a, T> DequeueFuture<'a, T> {
  pub(super) fn new(queue: &'a BoundedBlockingQueue<T>) -> Self {
    Self {
      queue,
      wait: AsyncWait::default(),
      completed: false,
    }
  }

  /// Makes the future resolve to [`DequeueError::Cancelled`] once `token` is
  /// cancelled while it is still waiting for an item.
  pub fn cancel_on(mut self, token: &'a CancelToken) -> Self {
    self.wait.token = Some(token);
    self
  }
}

impl<T> Future for DequeueFuture<'_, T> {
  type Output = Result<T, DequeueError>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let this = self.get_mut();
    assert!(!this.completed, "DequeueFuture polled after completion");

    match this.wait.poll_ready(this.queue, Condition::NotEmpty, cx) {
      Poll::Ready(Ok(mut state)) => match this.queue.commit_pop(&mut state) {
        Some(item) => {
          this.completed = true;
          Poll::Ready(Ok(item))
        }
        None => unreachable!("poll_ready returned a guard over an empty queue"),
      },
      Poll::Ready(Err(_)) => {
        this.completed = true;
        Poll::Ready(Err(DequeueError::Cancelled))
      }
      Poll::Pending => Poll::Pending,
    }
  }
}

impl<T> Drop for DequeueFuture<'_, T> {
  fn drop(&mut self) {
    self.wait.release(self.queue, Condition::NotEmpty);
  }
}

// --- QueueStream ---

/// A `Stream` over items dequeued from a queue.
///
/// The stream only ends if it was bound to a [`CancelToken`] that fires.
#[must_use = "streams do nothing unless polled"]
pub struct QueueStream<'a, T> {
  queue: &'a BoundedBlockingQueue<T>,
  token: Option<&'a CancelToken>,
  pending: Option<DequeueFuture<'a, T>>,
  finished: bool,
}

impl<T> fmt::Debug for QueueStream<'_, T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("QueueStream")
      .field("queue", &self.queue.label())
      .field("finished", &self.finished)
      .finish()
  }
}

impl<'a, T> QueueStream<'a, T> {
  pub(super) fn new(queue: &'a BoundedBlockingQueue<T>) -> Self {
    Self {
      queue,
      token: None,
      pending: None,
      finished: false,
    }
  }

  /// Ends the stream once `token` is cancelled.
  pub fn cancel_on(mut self, token: &'a CancelToken) -> Self {
    self.token = Some(token);
    self
  }
}

impl<T> Stream for QueueStream<'_, T> {
  type Item = T;

  fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    let this = self.get_mut();
    if this.finished {
      return Poll::Ready(None);
    }

    let future = this.pending.get_or_insert_with(|| {
      let future = this.queue.dequeue_async();
      match this.token {
        Some(token) => future.cancel_on(token),
        None => future,
      }
    });

    match Pin::new(future).poll(cx) {
      Poll::Ready(Ok(item)) => {
        this.pending = None;
        Poll::Ready(Some(item))
      }
      Poll::Ready(Err(_)) => {
        this.pending = None;
        this.finished = true;
        Poll::Ready(None)
      }
      Poll::Pending => Poll::Pending,
    }
  }
}
