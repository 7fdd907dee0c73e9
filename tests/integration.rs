//! Integration tests for flowable
//!
//! Tests operator chains end to end: demand accounting, cancellation,
//! terminal signals and threading behavior.

use std::{
  sync::{
    atomic::{AtomicU64, AtomicUsize, Ordering},
    Arc, Mutex,
  },
  thread,
  time::Duration,
};

use flowable::{prelude::*, testing::TestSubscriber};

/// Counts every item `source` actually produced.
fn counting<P: Publisher<Item = i32> + 'static>(source: P, produced: Arc<AtomicUsize>) -> impl Publisher<Item = i32> {
  source.map(move |v| {
    produced.fetch_add(1, Ordering::SeqCst);
    v
  })
}

#[flowable_macro::test]
fn test_no_over_delivery() {
  let subscriber = TestSubscriber::new(3);
  flowable::from_iter(1..=100)
    .map(|v| v + 1)
    .filter(|_| true)
    .flat_map(|v| flowable::from_iter(vec![v, -v]))
    .subscribe(subscriber.clone());

  assert_eq!(subscriber.item_count(), 3);
  subscriber.request(4);
  assert_eq!(subscriber.item_count(), 7);
  assert!(!subscriber.is_completed());
}

#[flowable_macro::test]
fn test_cancellation_silence() {
  let produced = Arc::new(AtomicUsize::new(0));
  let subscriber = TestSubscriber::new(2);
  counting(flowable::from_iter(1..=10), produced.clone()).map(|v| v * 10).subscribe(subscriber.clone());
  subscriber.cancel();
  subscriber.request(5);

  assert_eq!(subscriber.items(), vec![10, 20]);
  assert_eq!(subscriber.terminal_count(), 0);
  assert_eq!(produced.load(Ordering::SeqCst), 2);
}

#[flowable_macro::test]
fn test_filter_conservation() {
  let produced = Arc::new(AtomicUsize::new(0));
  let subscriber = TestSubscriber::new(2);
  counting(flowable::from_iter(vec![1, 2, 3, 4, 5]), produced.clone())
    .filter(|v| v % 2 == 0)
    .subscribe(subscriber.clone());

  assert_eq!(subscriber.items(), vec![2, 4]);
  // Two requested plus one replacement for each dropped odd item.
  assert_eq!(produced.load(Ordering::SeqCst), 4);
}

#[flowable_macro::test]
fn test_map_purity() {
  let result = flowable::from_iter(vec![1, 2, 3]).map(|x| x * 2).block_all().unwrap();
  assert_eq!(result, vec![2, 4, 6]);
}

#[flowable_macro::test]
fn test_reduce_totality() {
  let subscriber = TestSubscriber::new(1);
  flowable::from_iter(vec![1, 2, 3, 4]).reduce(|a, b| a + b).subscribe(subscriber.clone());
  assert_eq!(subscriber.items(), vec![10]);
  assert!(subscriber.is_completed());

  let empty = TestSubscriber::new(1);
  flowable::empty::<i32>().reduce(|a, b| a + b).subscribe(empty.clone());
  assert!(empty.items().is_empty());
  assert!(empty.is_completed());
}

#[flowable_macro::test]
fn test_flat_map_ordering() {
  let result = flowable::from_iter(vec!["a", "b"])
    .flat_map(|s| flowable::from_iter(vec![format!("{s}1"), format!("{s}2")]))
    .block_all()
    .unwrap();
  assert_eq!(result, vec!["a1", "a2", "b1", "b2"]);
}

#[flowable_macro::test]
fn test_flat_map_ordering_with_async_inner() {
  let result = flowable::from_iter(0..5)
    .flat_map(|v| flowable::from_iter(vec![v * 10, v * 10 + 1]).subscribe_on(flowable::scheduler::new_thread()))
    .block_all()
    .unwrap();
  assert_eq!(result, vec![0, 1, 10, 11, 20, 21, 30, 31, 40, 41]);
}

#[flowable_macro::test]
fn test_single_terminal_signal() {
  let subscriber = TestSubscriber::unbounded();
  flowable::from_iter(1..=20)
    .filter(|v| v % 3 != 0)
    .flat_map(|v| flowable::just(v))
    .map(|v| v * 2)
    .subscribe(subscriber.clone());

  assert!(subscriber.is_completed());
  assert_eq!(subscriber.terminal_count(), 1);
  assert_eq!(subscriber.signals_after_terminal(), 0);
}

#[flowable_macro::test]
fn test_error_short_circuit() {
  let produced = Arc::new(AtomicUsize::new(0));
  let subscriber = TestSubscriber::unbounded();
  counting(flowable::from_iter(vec![1, 2, 3, 4, 5]), produced.clone())
    .try_filter(|v| if *v == 3 { Err(FlowError::msg("third item")) } else { Ok(true) })
    .subscribe(subscriber.clone());

  assert_eq!(subscriber.items(), vec![1, 2]);
  assert_eq!(subscriber.terminal_count(), 1);
  assert_eq!(subscriber.failure().map(|e| e.to_string()), Some("third item".to_string()));
  assert_eq!(subscriber.signals_after_terminal(), 0);
  assert_eq!(produced.load(Ordering::SeqCst), 3);
}

fn failing_source() -> impl Publisher<Item = i32> {
  flowable::create(|emitter: Emitter<i32>| {
    emitter.emit(1);
    emitter.emit(2);
    emitter.fail("source broke");
  })
}

#[flowable_macro::test]
fn test_upstream_failure_passes_through_map_and_filter() {
  let subscriber = TestSubscriber::unbounded();
  failing_source().map(|v| v * 10).filter(|_| true).subscribe(subscriber.clone());

  assert_eq!(subscriber.items(), vec![10, 20]);
  assert_eq!(subscriber.failure().map(|e| e.to_string()), Some("source broke".to_string()));
  assert_eq!(subscriber.terminal_count(), 1);
  assert_eq!(subscriber.signals_after_terminal(), 0);
}

#[flowable_macro::test]
fn test_upstream_failure_discards_the_reduce_accumulator() {
  let subscriber = TestSubscriber::unbounded();
  failing_source().map(|v| v * 10).reduce(|a, b| a + b).subscribe(subscriber.clone());

  assert!(subscriber.items().is_empty());
  assert_eq!(subscriber.failure().map(|e| e.to_string()), Some("source broke".to_string()));
  assert_eq!(subscriber.terminal_count(), 1);
}

#[flowable_macro::test]
fn test_emitter_respects_demand() {
  let source = flowable::create(|emitter: Emitter<u32>| {
    for v in 0..10 {
      emitter.emit(v);
    }
    emitter.complete();
  });
  let subscriber = TestSubscriber::new(4);
  source.map(|v| v + 1).subscribe(subscriber.clone());
  assert_eq!(subscriber.items(), vec![1, 2, 3, 4]);
  subscriber.request(UNBOUNDED);
  assert_eq!(subscriber.item_count(), 10);
  assert!(subscriber.is_completed());
}

#[flowable_macro::test]
fn test_invalid_demand_fails_the_chain() {
  let subscriber = TestSubscriber::new(0);
  flowable::from_iter(1..=3).map(|v| v).subscribe(subscriber.clone());
  subscriber.request(0);
  assert!(matches!(subscriber.failure(), Some(FlowError::InvalidDemand(0))));
}

#[flowable_macro::test]
fn test_subscribe_on_crosses_threads() {
  let producer_thread = Arc::new(Mutex::new(None));
  let c_producer_thread = producer_thread.clone();
  let subscriber = TestSubscriber::unbounded();
  flowable::create(move |emitter: Emitter<i32>| {
    *c_producer_thread.lock().unwrap() = Some(thread::current().id());
    emitter.emit(1);
    emitter.complete();
  })
  .subscribe_on(flowable::scheduler::new_thread())
  .subscribe(subscriber.clone());

  assert!(subscriber.await_terminal(Duration::from_secs(5)));
  assert_eq!(subscriber.items(), vec![1]);
  assert_ne!(*producer_thread.lock().unwrap(), Some(thread::current().id()));
}

#[flowable_macro::test]
fn test_concurrent_requests_never_over_deliver() {
  let subscriber = TestSubscriber::new(0);
  flowable::from_iter(0..10_000)
    .flat_map(|v| flowable::from_iter(vec![v; 3]))
    .filter(|v| v % 2 == 0)
    .subscribe(subscriber.clone());

  let handles: Vec<_> = (0..4)
    .map(|_| {
      let subscriber = subscriber.clone();
      thread::spawn(move || {
        for _ in 0..250 {
          subscriber.request(1);
        }
      })
    })
    .collect();
  for handle in handles {
    handle.join().unwrap();
  }

  assert_eq!(subscriber.item_count(), 1000);
  assert_eq!(subscriber.terminal_count(), 0);
}

#[flowable_macro::test]
fn test_cancel_from_another_thread() {
  let delivered = Arc::new(AtomicU64::new(0));
  let c_delivered = delivered.clone();
  let source = flowable::create(|emitter: Emitter<u64>| {
    thread::spawn(move || {
      let mut next = 0;
      while !emitter.is_cancelled() {
        emitter.emit(next);
        next += 1;
        thread::sleep(Duration::from_micros(50));
      }
    });
  });
  let subscriber = TestSubscriber::unbounded();
  source.map(move |v| {
    c_delivered.fetch_add(1, Ordering::SeqCst);
    v
  })
  .subscribe(subscriber.clone());

  while delivered.load(Ordering::SeqCst) < 10 {
    thread::sleep(Duration::from_millis(1));
  }
  subscriber.cancel();
  thread::sleep(Duration::from_millis(5));
  let after_cancel = subscriber.item_count();
  thread::sleep(Duration::from_millis(20));
  assert_eq!(subscriber.item_count(), after_cancel);
  assert_eq!(subscriber.terminal_count(), 0);
}

#[flowable_macro::test]
async fn test_into_stream_chain() {
  use futures::StreamExt;

  let items: Vec<_> = flowable::from_iter(1..=6)
    .filter(|v| v % 2 == 1)
    .flat_map(|v| flowable::from_iter(vec![v, v]))
    .into_stream(3)
    .map(|item| item.unwrap())
    .collect()
    .await;
  assert_eq!(items, vec![1, 1, 3, 3, 5, 5]);
}

#[cfg(feature = "futures-scheduler")]
#[flowable_macro::test]
fn test_default_scheduler() {
  let result = flowable::from_iter(0..1000)
    .subscribe_on(DefaultScheduler)
    .map(|v| v % 7)
    .reduce(|a, b| a.max(b))
    .block_all()
    .unwrap();
  assert_eq!(result, vec![6]);
}

#[flowable_macro::test]
fn test_for_each_and_subscribe_all() {
  let sum = Arc::new(AtomicU64::new(0));
  let c_sum = sum.clone();
  flowable::from_iter(1..=10u64).for_each(move |v| {
    c_sum.fetch_add(v, Ordering::SeqCst);
  });
  assert_eq!(sum.load(Ordering::SeqCst), 55);

  let completed = Arc::new(AtomicUsize::new(0));
  let c_completed = completed.clone();
  flowable::from_iter(1..=3).subscribe_all(
    |s: &dyn Subscription| s.request(2),
    |s: &dyn Subscription, _| s.request(1),
    move || {
      c_completed.fetch_add(1, Ordering::SeqCst);
    },
    |_| {},
  );
  assert_eq!(completed.load(Ordering::SeqCst), 1);
}
