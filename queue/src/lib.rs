#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

//! A bounded, blocking FIFO queue for many producers and many consumers.
//!
//! [`BoundedBlockingQueue`] blocks producers while it is full and consumers
//! while it is empty, without losing items, deadlocking or missing wakeups.
//! The same queue serves blocking threads and async tasks, and every blocking
//! operation has a timed and a cancellable form that leaves the queue untouched
//! when it gives up.
//!
//! ```
//! use boundq::BoundedBlockingQueue;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let queue = Arc::new(BoundedBlockingQueue::new(2).unwrap());
//!
//! let producer = {
//!   let queue = Arc::clone(&queue);
//!   thread::spawn(move || {
//!     for i in 0..10 {
//!       queue.enqueue(i);
//!     }
//!   })
//! };
//!
//! let received: Vec<i32> = (0..10).map(|_| queue.dequeue()).collect();
//! producer.join().unwrap();
//! assert_eq!(received, (0..10).collect::<Vec<_>>());
//! ```

pub mod cancel;
pub mod config;
pub mod error;

mod bounded;

// Internal utilities - not part of public API but exposed for crate use
mod internal;

pub use bounded::{BoundedBlockingQueue, DequeueFuture, EnqueueFuture, QueueStats, QueueStream};
pub use cancel::CancelToken;
pub use config::QueueConfig;
pub use error::{ConfigError, DequeueError, EnqueueError, QueueError, TryEnqueueError};
