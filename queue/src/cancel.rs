//! Cooperative cancellation for blocked queue operations.
//!
//! A [`CancelToken`] is handed to the `*_cancellable` operations (or bound to an
//! async operation with `cancel_on`). Calling [`CancelToken::cancel`] wakes every
//! thread and task currently blocked on behalf of the token; each of them
//! returns a `Cancelled` error and leaves the queue untouched.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::Waker;

use parking_lot::Mutex;
use tracing::debug;

use crate::internal::WakeHandle;

#[derive(Debug, Default)]
struct Watchers {
  next_id: u64,
  handles: Vec<(u64, WakeHandle)>,
}

#[derive(Default)]
struct CancelInner {
  cancelled: AtomicBool,
  watchers: Mutex<Watchers>,
}

/// A cloneable, sticky cancellation signal.
///
/// All clones share the same state. Once cancelled, a token stays cancelled;
/// create a new token for the next batch of operations.
#[derive(Clone, Default)]
pub struct CancelToken {
  inner: Arc<CancelInner>,
}

impl fmt::Debug for CancelToken {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let watchers = self.inner.watchers.lock();
    f.debug_struct("CancelToken")
      .field("cancelled", &self.is_cancelled())
      .field("watchers", &watchers.handles.len())
      .finish()
  }
}

impl CancelToken {
  /// Creates a token that is not cancelled.
  pub fn new() -> Self {
    Self::default()
  }

  /// Cancels the token and wakes every operation blocked on it.
  ///
  /// Calling this more than once has no further effect.
  pub fn cancel(&self) {
    if self.inner.cancelled.swap(true, Ordering::SeqCst) {
      return;
    }
    let handles = std::mem::take(&mut self.inner.watchers.lock().handles);
    debug!(woken = handles.len(), "cancellation requested");
    for (_, handle) in handles {
      handle.wake();
    }
  }

  /// Returns `true` once [`cancel`](Self::cancel) has been called on any clone.
  pub fn is_cancelled(&self) -> bool {
    self.inner.cancelled.load(Ordering::SeqCst)
  }

  /// Registers a handle to be woken on cancellation until the returned guard
  /// is dropped.
  ///
  /// Callers must check [`is_cancelled`](Self::is_cancelled) after registering:
  /// a cancellation that raced ahead of the registration is only visible
  /// through the flag.
  pub(crate) fn watch(&self, handle: WakeHandle) -> CancelWatch<'_> {
    let mut watchers = self.inner.watchers.lock();
    let id = watchers.next_id;
    watchers.next_id = watchers.next_id.wrapping_add(1);
    watchers.handles.push((id, handle));
    CancelWatch { token: self, id }
  }
}

/// Keeps a wake handle registered with a [`CancelToken`].
#[derive(Debug)]
pub(crate) struct CancelWatch<'a> {
  token: &'a CancelToken,
  id: u64,
}

impl CancelWatch<'_> {
  pub(crate) fn refresh(&self, waker: &Waker) {
    let mut watchers = self.token.inner.watchers.lock();
    if let Some((_, handle)) = watchers.handles.iter_mut().find(|(id, _)| *id == self.id) {
      handle.refresh(waker);
    }
  }
}

impl Drop for CancelWatch<'_> {
  fn drop(&mut self) {
    let mut watchers = self.token.inner.watchers.lock();
    watchers.handles.retain(|(id, _)| *id != self.id);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::thread;
  use std::time::Duration;

  #[test]
  fn cancel_is_sticky_and_shared_by_clones() {
    let token = CancelToken::new();
    let clone = token.clone();
    assert!(!clone.is_cancelled());
    token.cancel();
    token.cancel();
    assert!(clone.is_cancelled());
  }

  #[test]
  fn cancel_unparks_watching_thread() {
    let token = CancelToken::new();
    let remote = token.clone();
    let handle = thread::spawn(move || {
      let _watch = remote.watch(WakeHandle::current_thread());
      while !remote.is_cancelled() {
        thread::park();
      }
    });

    thread::sleep(Duration::from_millis(50));
    token.cancel();
    handle.join().expect("watcher thread panicked");
  }

  #[test]
  fn dropped_watch_is_unregistered() {
    let token = CancelToken::new();
    {
      let _watch = token.watch(WakeHandle::current_thread());
      assert_eq!(token.inner.watchers.lock().handles.len(), 1);
    }
    assert!(token.inner.watchers.lock().handles.is_empty());
  }
}
