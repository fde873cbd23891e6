mod common;
use common::*;

use boundq::{BoundedBlockingQueue, CancelToken, DequeueError, EnqueueError};

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn cancel_unblocks_waiting_consumer() {
  let queue = Arc::new(BoundedBlockingQueue::<u32>::new(2).unwrap());
  let token = CancelToken::new();

  let consumer = {
    let queue = Arc::clone(&queue);
    let token = token.clone();
    thread::spawn(move || queue.dequeue_cancellable(&token))
  };

  thread::sleep(SHORT_TIMEOUT);
  assert!(!consumer.is_finished(), "consumer should be parked");

  let start = Instant::now();
  token.cancel();
  assert_eq!(consumer.join().unwrap(), Err(DequeueError::Cancelled));
  assert!(start.elapsed() < LONG_TIMEOUT);
  assert!(queue.is_empty());
}

#[test]
fn cancel_hands_item_back_and_leaves_queue_unchanged() {
  let queue = Arc::new(BoundedBlockingQueue::new(1).unwrap());
  queue.enqueue(String::from("head"));
  let token = CancelToken::new();

  let producer = {
    let queue = Arc::clone(&queue);
    let token = token.clone();
    thread::spawn(move || queue.enqueue_cancellable(String::from("rejected"), &token))
  };

  thread::sleep(SHORT_TIMEOUT);
  token.cancel();

  match producer.join().unwrap() {
    Err(EnqueueError::Cancelled(item)) => assert_eq!(item, "rejected"),
    other => panic!("expected cancellation, got {:?}", other),
  }
  assert_eq!(queue.snapshot(), vec![String::from("head")]);
  assert_eq!(queue.stats().enqueued, 1);
}

#[test]
fn one_token_cancels_every_waiter() {
  let queue = Arc::new(BoundedBlockingQueue::<usize>::new(4).unwrap());
  let token = CancelToken::new();

  let consumers: Vec<_> = (0..4)
    .map(|_| {
      let queue = Arc::clone(&queue);
      let token = token.clone();
      thread::spawn(move || queue.dequeue_cancellable(&token))
    })
    .collect();

  thread::sleep(SHORT_TIMEOUT);
  token.cancel();
  for consumer in consumers {
    assert_eq!(consumer.join().unwrap(), Err(DequeueError::Cancelled));
  }
}

#[test]
fn cancelled_token_does_not_block_ready_operations() {
  let queue = BoundedBlockingQueue::new(1).unwrap();
  let token = CancelToken::new();
  token.cancel();

  // Room and items are available, so neither call needs to wait.
  queue.enqueue_cancellable(5, &token).unwrap();
  assert_eq!(queue.dequeue_cancellable(&token), Ok(5));

  assert!(queue.enqueue_cancellable(6, &token).is_ok());
  assert!(queue.enqueue_cancellable(7, &token).unwrap_err().is_cancelled());
}

#[test]
fn cancelling_one_consumer_keeps_others_waiting() {
  let queue = Arc::new(BoundedBlockingQueue::<u32>::new(1).unwrap());
  let doomed = CancelToken::new();
  let kept = CancelToken::new();

  let cancelled = {
    let queue = Arc::clone(&queue);
    let token = doomed.clone();
    thread::spawn(move || queue.dequeue_cancellable(&token))
  };
  let survivor = {
    let queue = Arc::clone(&queue);
    let token = kept.clone();
    thread::spawn(move || queue.dequeue_cancellable(&token))
  };

  thread::sleep(SHORT_TIMEOUT);
  doomed.cancel();
  assert_eq!(cancelled.join().unwrap(), Err(DequeueError::Cancelled));
  assert!(!survivor.is_finished());

  queue.enqueue(99);
  assert_eq!(survivor.join().unwrap(), Ok(99));
}

// Two consumers race for one item while one of them gives up on a short
// timeout. If the enqueue signals the one that gives up, the wake must reach
// the consumer that keeps waiting.
#[test]
fn timed_out_consumer_never_strands_the_item() {
  for _ in 0..ITEMS_LOW {
    let queue = Arc::new(BoundedBlockingQueue::<u32>::new(1).unwrap());

    let impatient = {
      let queue = Arc::clone(&queue);
      thread::spawn(move || queue.dequeue_timeout(Duration::from_millis(5)))
    };
    let patient = {
      let queue = Arc::clone(&queue);
      thread::spawn(move || queue.dequeue_timeout(LONG_TIMEOUT))
    };

    thread::sleep(Duration::from_millis(5));
    queue.enqueue(1);

    match impatient.join().unwrap() {
      // It won the race; the patient consumer is still parked.
      Ok(item) => {
        assert_eq!(item, 1);
        queue.enqueue(2);
        assert_eq!(patient.join().unwrap(), Ok(2));
      }
      Err(err) => {
        assert_eq!(err, DequeueError::Timeout);
        assert_eq!(patient.join().unwrap(), Ok(1), "item was stranded");
      }
    }
    assert!(queue.is_empty());
  }
}

#[test]
fn cancelled_producer_never_strands_the_slot() {
  for _ in 0..ITEMS_LOW {
    let queue = Arc::new(BoundedBlockingQueue::new(1).unwrap());
    queue.enqueue(0);
    let token = CancelToken::new();

    let cancelled = {
      let queue = Arc::clone(&queue);
      let token = token.clone();
      thread::spawn(move || queue.enqueue_cancellable(1, &token))
    };
    let patient = {
      let queue = Arc::clone(&queue);
      thread::spawn(move || queue.enqueue_timeout(2, LONG_TIMEOUT))
    };

    thread::sleep(Duration::from_millis(5));
    assert_eq!(queue.dequeue(), 0);
    token.cancel();

    match cancelled.join().unwrap() {
      // The slot reached it before the cancellation did.
      Ok(()) => assert_eq!(queue.dequeue(), 1),
      Err(err) => assert_eq!(err.into_inner(), 1),
    }
    assert!(patient.join().unwrap().is_ok(), "free slot was stranded");

    let resident = queue.drain();
    assert_eq!(resident, vec![2]);
  }
}
