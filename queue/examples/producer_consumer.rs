// examples/producer_consumer.rs
//
// One producer thread pushes a batch of jobs through a two-slot queue while a
// consumer thread prints them. Run with `RUST_LOG=boundq=trace` to watch the
// producer park whenever the queue is full.
use boundq::{BoundedBlockingQueue, CancelToken, DequeueError, QueueConfig};
use std::{sync::Arc, thread, time::Duration};
use tracing_subscriber::EnvFilter;

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let config = QueueConfig::from_yaml_str("capacity: 2\nname: jobs\n").expect("demo config is valid");
  let queue = Arc::new(BoundedBlockingQueue::from_config(&config).expect("demo capacity is positive"));
  let stop = CancelToken::new();

  println!("--- Producer/Consumer over {:?} ---", queue);

  let producer = {
    let queue = Arc::clone(&queue);
    thread::spawn(move || {
      for i in 0..10 {
        let job = format!("job-{}", i);
        println!("[Producer] Enqueueing: {} (size before: {})", job, queue.size());
        queue.enqueue(job);
      }
      println!("[Producer] Done.");
    })
  };

  let consumer = {
    let queue = Arc::clone(&queue);
    let stop = stop.clone();
    thread::spawn(move || {
      let mut handled = 0;
      loop {
        match queue.dequeue_cancellable(&stop) {
          Ok(job) => {
            println!("[Consumer] Dequeued: {}", job);
            handled += 1;
            // Slow consumer, so the producer spends most of its time blocked.
            thread::sleep(Duration::from_millis(50));
          }
          Err(DequeueError::Cancelled) => {
            println!("[Consumer] Stop requested.");
            break;
          }
          Err(err) => {
            println!("[Consumer] Unexpected error: {}", err);
            break;
          }
        }
      }
      handled
    })
  };

  producer.join().unwrap();
  while !queue.is_empty() {
    thread::sleep(Duration::from_millis(10));
  }
  stop.cancel();

  let handled = consumer.join().unwrap();
  println!("--- Handled {} jobs, stats: {:?} ---", handled, queue.stats());
}
