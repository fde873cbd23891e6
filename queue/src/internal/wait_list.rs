//! Bookkeeping for one wait condition of the queue ("not full" or "not empty").
//!
//! A `WaitList` is always accessed under the queue's mutex. It keeps a FIFO of
//! parked threads and tasks plus the number of signals that have been
//! delivered but not yet claimed by the woken waiter. Signaling is driven by
//! how much of the awaited resource exists after a mutation: waiters are woken
//! only while the signals in flight do not already cover it. That keeps wakes
//! one-for-one with state changes and lets a waiter that gives up after being
//! signaled hand its wake to the next waiter.

use std::collections::VecDeque;
use std::task::Waker;
use std::thread::{self, Thread};

/// Either a parked synchronous thread or a pending asynchronous task.
#[derive(Debug, Clone)]
pub(crate) enum WakeHandle {
  Sync(Thread),
  Async(Waker),
}

impl WakeHandle {
  pub(crate) fn current_thread() -> Self {
    WakeHandle::Sync(thread::current())
  }

  /// Wakes the underlying thread or task.
  pub(crate) fn wake(self) {
    match self {
      WakeHandle::Sync(thread) => thread.unpark(),
      WakeHandle::Async(waker) => waker.wake(),
    }
  }

  /// Replaces a stale async waker. Sync handles never change.
  pub(crate) fn refresh(&mut self, waker: &Waker) {
    if let WakeHandle::Async(current) = self {
      if !current.will_wake(waker) {
        *current = waker.clone();
      }
    }
  }
}

/// Identifies one registration in a `WaitList`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WaitKey(u64);

#[derive(Debug)]
struct Entry {
  key: WaitKey,
  handle: WakeHandle,
}

#[derive(Debug, Default)]
pub(crate) struct WaitList {
  parked: VecDeque<Entry>,
  /// Signals delivered to waiters that have not re-acquired the lock yet.
  in_flight: usize,
  next_key: u64,
}

impl WaitList {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  /// Parks a new waiter at the back of the list.
  pub(crate) fn register(&mut self, handle: WakeHandle) -> WaitKey {
    let key = WaitKey(self.next_key);
    self.next_key = self.next_key.wrapping_add(1);
    self.parked.push_back(Entry { key, handle });
    key
  }

  pub(crate) fn is_parked(&self, key: WaitKey) -> bool {
    self.parked.iter().any(|entry| entry.key == key)
  }

  /// Updates the waker of a parked async waiter.
  pub(crate) fn refresh(&mut self, key: WaitKey, waker: &Waker) {
    if let Some(entry) = self.parked.iter_mut().find(|entry| entry.key == key) {
      entry.handle.refresh(waker);
    }
  }

  /// Resolves a wake-up for `key`.
  ///
  /// Returns `true` if the waiter had been signaled; its signal is consumed and
  /// the registration is gone. Returns `false` if the waiter is still parked
  /// (spurious wake, cancellation or timeout) and keeps its place.
  pub(crate) fn claim(&mut self, key: WaitKey) -> bool {
    if self.is_parked(key) {
      return false;
    }
    debug_assert!(self.in_flight > 0, "claimed a signal that was never delivered");
    self.in_flight = self.in_flight.saturating_sub(1);
    true
  }

  /// Removes a waiter that stops waiting.
  ///
  /// Returns `true` if the waiter was holding an unclaimed signal. The caller
  /// must re-signal so that the wake reaches another waiter.
  pub(crate) fn abandon(&mut self, key: WaitKey) -> bool {
    if let Some(pos) = self.parked.iter().position(|entry| entry.key == key) {
      self.parked.remove(pos);
      false
    } else {
      debug_assert!(self.in_flight > 0, "abandoned a signal that was never delivered");
      self.in_flight = self.in_flight.saturating_sub(1);
      true
    }
  }

  /// Wakes parked waiters, oldest first, until the signals in flight cover
  /// `available` units of the awaited resource. Returns how many were woken.
  pub(crate) fn signal(&mut self, available: usize) -> usize {
    let mut woken = 0;
    while self.in_flight < available {
      let Some(entry) = self.parked.pop_front() else {
        break;
      };
      self.in_flight += 1;
      entry.handle.wake();
      woken += 1;
    }
    woken
  }

  /// Number of waiters currently parked.
  pub(crate) fn parked(&self) -> usize {
    self.parked.len()
  }

  #[cfg(test)]
  pub(crate) fn in_flight(&self) -> usize {
    self.in_flight
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;
  use std::task::Wake;

  struct CountingWaker(AtomicUsize);

  impl Wake for CountingWaker {
    fn wake(self: Arc<Self>) {
      self.0.fetch_add(1, Ordering::SeqCst);
    }
  }

  fn counting_waker() -> (Arc<CountingWaker>, Waker) {
    let counter = Arc::new(CountingWaker(AtomicUsize::new(0)));
    let waker = Waker::from(counter.clone());
    (counter, waker)
  }

  #[test]
  fn signal_wakes_only_what_is_available() {
    let mut list = WaitList::new();
    let (counter, waker) = counting_waker();
    let a = list.register(WakeHandle::Async(waker.clone()));
    let b = list.register(WakeHandle::Async(waker.clone()));
    let c = list.register(WakeHandle::Async(waker));

    assert_eq!(list.signal(1), 1);
    assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    // Same resource level again: the delivered signal already covers it.
    assert_eq!(list.signal(1), 0);
    assert_eq!(list.signal(2), 1);

    assert!(list.claim(a));
    assert!(list.claim(b));
    assert!(!list.claim(c));
    assert_eq!(list.in_flight(), 0);
    assert_eq!(list.parked(), 1);
  }

  #[test]
  fn abandon_of_parked_waiter_keeps_signals() {
    let mut list = WaitList::new();
    let (_counter, waker) = counting_waker();
    let a = list.register(WakeHandle::Async(waker.clone()));
    let b = list.register(WakeHandle::Async(waker));
    assert_eq!(list.signal(1), 1);

    assert!(!list.abandon(b));
    assert_eq!(list.in_flight(), 1);
    assert!(list.abandon(a));
    assert_eq!(list.in_flight(), 0);
    assert_eq!(list.parked(), 0);
  }

  #[test]
  fn abandoned_signal_can_be_passed_on() {
    let mut list = WaitList::new();
    let (counter, waker) = counting_waker();
    let a = list.register(WakeHandle::Async(waker.clone()));
    let b = list.register(WakeHandle::Async(waker));
    list.signal(1);

    assert!(list.abandon(a));
    assert_eq!(list.signal(1), 1);
    assert!(list.claim(b));
    assert_eq!(counter.0.load(Ordering::SeqCst), 2);
  }

  #[test]
  fn refresh_replaces_stale_waker() {
    let mut list = WaitList::new();
    let (old, old_waker) = counting_waker();
    let (new, new_waker) = counting_waker();
    let key = list.register(WakeHandle::Async(old_waker));
    list.refresh(key, &new_waker);
    list.signal(1);
    assert_eq!(old.0.load(Ordering::SeqCst), 0);
    assert_eq!(new.0.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn sync_handle_is_unparked() {
    let mut list = WaitList::new();
    let key = list.register(WakeHandle::current_thread());
    list.signal(1);
    // The unpark token is stored, so this returns immediately.
    thread::park();
    assert!(list.claim(key));
  }
}
