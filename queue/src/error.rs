// src/error.rs

//! Error types returned by the queue and its configuration loader.
//!
//! Errors that turn an item away ([`EnqueueError`], [`TryEnqueueError`]) carry
//! it back to the caller through `into_inner`.

use core::fmt;

use thiserror::Error;

// Errors that hand the rejected item back to the caller share the same
// `into_inner`, `Display` and `Error` plumbing.
macro_rules! impl_error_for_enum_with_inner {
  (
    $enum_name:ident < $generic_param:ident >,
    $($variant:ident ( $message:expr ) ),+
    $(,)?
  ) => {
    impl<$generic_param> $enum_name<$generic_param> {
      /// Consumes the error, returning the item that could not be enqueued.
      #[inline]
      pub fn into_inner(self) -> $generic_param {
        match self {
          $( $enum_name::$variant(v) => v, )+
        }
      }
    }

    impl<$generic_param> fmt::Debug for $enum_name<$generic_param> {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
          $( $enum_name::$variant(_) => f.write_str(concat!(stringify!($enum_name), "::", stringify!($variant), "(..)")), )+
        }
      }
    }

    impl<$generic_param> fmt::Display for $enum_name<$generic_param> {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
          $( $enum_name::$variant(_) => f.write_str($message), )+
        }
      }
    }

    impl<$generic_param> std::error::Error for $enum_name<$generic_param> {}
  };
}

/// Errors raised by construction and by `offer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
  /// The queue was created with a capacity of zero. Use
  /// [`BoundedBlockingQueue::unbounded`](crate::BoundedBlockingQueue::unbounded)
  /// for a queue without a practical bound.
  #[error("queue capacity must be positive, got {capacity}")]
  InvalidCapacity {
    /// The rejected capacity.
    capacity: usize,
  },
  /// An absent item (`None`) was offered. The queue was not touched.
  #[error("cannot enqueue an absent item")]
  InvalidArgument,
}

/// Error returned by the blocking enqueue variants that can give up waiting.
///
/// The item is handed back and the queue is left exactly as it was.
#[derive(PartialEq, Eq, Clone)]
pub enum EnqueueError<T> {
  /// The caller's [`CancelToken`](crate::CancelToken) fired while waiting for room.
  Cancelled(T),
  /// The wait duration elapsed before room became available.
  Timeout(T),
}

impl_error_for_enum_with_inner!(
  EnqueueError<T>,
  Cancelled("enqueue cancelled while waiting for room"),
  Timeout("enqueue timed out waiting for room"),
);

impl<T> EnqueueError<T> {
  /// Returns `true` if the wait ended because of cancellation.
  pub fn is_cancelled(&self) -> bool {
    matches!(self, EnqueueError::Cancelled(_))
  }

  /// Returns `true` if the wait ended because its duration elapsed.
  pub fn is_timeout(&self) -> bool {
    matches!(self, EnqueueError::Timeout(_))
  }
}

/// Error returned by `try_enqueue` when the item cannot be accepted right now.
#[derive(PartialEq, Eq, Clone)]
pub enum TryEnqueueError<T> {
  /// The queue holds `capacity` items.
  Full(T),
}

impl_error_for_enum_with_inner!(TryEnqueueError<T>, Full("queue full"));

/// Error returned by the blocking dequeue variants that can give up waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DequeueError {
  /// The caller's [`CancelToken`](crate::CancelToken) fired while waiting for an item.
  #[error("dequeue cancelled while waiting for an item")]
  Cancelled,
  /// The wait duration elapsed before an item arrived.
  #[error("dequeue timed out waiting for an item")]
  Timeout,
}

/// Errors raised while loading a [`QueueConfig`](crate::QueueConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
  /// The configuration file could not be read.
  #[error("failed to read queue configuration: {0}")]
  Read(#[from] std::io::Error),

  /// The document is not valid YAML or does not match the expected shape.
  #[error("failed to parse queue configuration: {0}")]
  Parse(#[from] serde_yaml::Error),

  /// The document parsed but describes an impossible queue.
  #[error("invalid queue configuration: {0}")]
  Invalid(#[from] QueueError),
}
