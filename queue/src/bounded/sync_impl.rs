// src/bounded/sync_impl.rs

//! Implementation of the synchronous, blocking enqueue and dequeue logic.

use super::core::{Abandon, Condition, QueueState};
use super::BoundedBlockingQueue;
use crate::cancel::CancelToken;
use crate::error::{DequeueError, EnqueueError};
use crate::internal::WakeHandle;

use std::thread;
use std::time::Instant;

use parking_lot::MutexGuard;
use tracing::{debug, trace};

pub(super) fn enqueue<T>(
  queue: &BoundedBlockingQueue<T>,
  item: T,
  deadline: Option<Instant>,
  token: Option<&CancelToken>,
) -> Result<(), EnqueueError<T>> {
  match wait_for(queue, Condition::NotFull, deadline, token) {
    Ok(mut state) => {
      queue.commit_push(&mut state, item);
      Ok(())
    }
    Err(Abandon::Cancelled) => Err(EnqueueError::Cancelled(item)),
    Err(Abandon::TimedOut) => Err(EnqueueError::Timeout(item)),
  }
}

pub(super) fn dequeue<T>(
  queue: &BoundedBlockingQueue<T>,
  deadline: Option<Instant>,
  token: Option<&CancelToken>,
) -> Result<T, DequeueError> {
  let mut state = wait_for(queue, Condition::NotEmpty, deadline, token).map_err(|reason| match reason {
    Abandon::Cancelled => DequeueError::Cancelled,
    Abandon::TimedOut => DequeueError::Timeout,
  })?;
  match queue.commit_pop(&mut state) {
    Some(item) => Ok(item),
    None => unreachable!("wait_for returned a guard over an empty queue"),
  }
}

/// Blocks the current thread until `condition` holds, then returns the locked
/// state so the caller can act on it before anyone else sees the change.
///
/// The loop has three phases: resolve the previous wake-up (if any), check the
/// condition, and otherwise park. Every wake-up re-checks the condition, so
/// spurious unparks are harmless. A waiter that gives up after it was signaled
/// re-signals, so the wake it consumed reaches another waiter.
fn wait_for<'a, T>(
  queue: &'a BoundedBlockingQueue<T>,
  condition: Condition,
  deadline: Option<Instant>,
  token: Option<&CancelToken>,
) -> Result<MutexGuard<'a, QueueState<T>>, Abandon> {
  // Registered before the first check so that a concurrent `cancel()` either
  // is seen through the flag or unparks us.
  let _watch = token.map(|token| token.watch(WakeHandle::current_thread()));

  let mut state = queue.state.lock();
  let mut key = None;

  loop {
    // --- Phase 1: Resolve the previous wake-up ---
    if let Some(parked) = key {
      if state.waiters(condition).claim(parked) {
        key = None;
      }
    }

    // --- Phase 2: Check the condition ---
    // A waiter that is still parked leaves the resource to the ones already signaled.
    if key.is_none() && state.is_satisfied(condition, queue.capacity) {
      return Ok(state);
    }

    let abandon = if token.is_some_and(CancelToken::is_cancelled) {
      Some(Abandon::Cancelled)
    } else if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
      Some(Abandon::TimedOut)
    } else {
      None
    };
    if let Some(reason) = abandon {
      if let Some(parked) = key {
        state.waiters(condition).abandon(parked);
      }
      let passed_on = state.resignal(queue.capacity);
      debug!(
        queue = queue.label(),
        ?condition,
        ?reason,
        len = state.items.len(),
        passed_on,
        "blocked operation abandoned"
      );
      return Err(reason);
    }

    // --- Phase 3: Park ---
    if key.is_none() {
      key = Some(state.waiters(condition).register(WakeHandle::current_thread()));
      trace!(
        queue = queue.label(),
        ?condition,
        len = state.items.len(),
        parked = state.waiters(condition).parked(),
        "parking"
      );
    }
    MutexGuard::unlocked(&mut state, || match deadline {
      Some(deadline) => thread::park_timeout(deadline.saturating_duration_since(Instant::now())),
      None => thread::park(),
    });
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;
  use std::time::Duration;

  #[test]
  fn satisfied_condition_returns_without_parking() {
    let queue = BoundedBlockingQueue::<u32>::new(1).unwrap();
    let state = wait_for(&queue, Condition::NotFull, None, None).unwrap();
    assert!(state.items.is_empty());
    assert_eq!(state.not_full.parked(), 0);
  }

  #[test]
  fn expired_deadline_leaves_no_registration() {
    let queue = BoundedBlockingQueue::<u32>::new(1).unwrap();
    let outcome = wait_for(&queue, Condition::NotEmpty, Some(Instant::now()), None);
    assert_eq!(outcome.err(), Some(Abandon::TimedOut));
    let state = queue.state.lock();
    assert_eq!(state.not_empty.parked(), 0);
  }

  #[test]
  fn cancelled_token_wins_over_deadline() {
    let queue = BoundedBlockingQueue::<u32>::new(1).unwrap();
    let token = CancelToken::new();
    token.cancel();
    let outcome = wait_for(&queue, Condition::NotEmpty, Some(Instant::now()), Some(&token));
    assert_eq!(outcome.err(), Some(Abandon::Cancelled));
  }

  #[test]
  fn timed_out_waiter_cleans_up_after_parking() {
    let queue = Arc::new(BoundedBlockingQueue::<u32>::new(1).unwrap());
    let remote = queue.clone();
    let handle = thread::spawn(move || remote.dequeue_timeout(Duration::from_millis(50)));
    assert_eq!(handle.join().unwrap(), Err(DequeueError::Timeout));

    let state = queue.state.lock();
    assert_eq!(state.not_empty.parked(), 0);
  }
}
