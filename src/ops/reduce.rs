//! Reduce operator implementation
//!
//! This module contains the `Reduce` operator, which folds every upstream item
//! into an accumulator seeded with the first item and emits the final value
//! when the upstream completes.
//!
//! Upstream items are pulled one at a time: the first downstream `request`
//! asks for one item, and every consumed item asks for the next. An upstream
//! that completes without emitting leaves nothing to emit, so the downstream
//! only sees `complete`.

use std::{
  marker::PhantomData,
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, PoisonError,
  },
};

use crate::{
  error::FlowError,
  operation::{Operation, OperationBase, OperationHandle},
  publisher::Publisher,
  subscriber::SubscriberRef,
};

/// Defines how an item is folded into the accumulator.
pub trait ReduceStrategy<Item>: Send + Sync + 'static {
  /// Applies the reduction logic.
  ///
  /// # Arguments
  /// * `acc` - The current accumulated value. `None` for the first item.
  /// * `value` - The next upstream item.
  fn apply(&self, acc: Option<Item>, value: Item) -> Result<Item, FlowError>;
}

/// Strategy for `reduce`.
///
/// Uses the first item as the initial accumulator.
#[derive(Clone)]
pub struct ReduceFn<F>(pub F);

impl<F, Item> ReduceStrategy<Item> for ReduceFn<F>
where
  F: Fn(Item, Item) -> Item + Send + Sync + 'static,
{
  fn apply(&self, acc: Option<Item>, value: Item) -> Result<Item, FlowError> {
    Ok(match acc {
      Some(acc) => (self.0)(acc, value),
      None => value,
    })
  }
}

/// Strategy for `try_reduce`.
#[derive(Clone)]
pub struct TryReduceFn<F>(pub F);

impl<F, Item> ReduceStrategy<Item> for TryReduceFn<F>
where
  F: Fn(Item, Item) -> Result<Item, FlowError> + Send + Sync + 'static,
{
  fn apply(&self, acc: Option<Item>, value: Item) -> Result<Item, FlowError> {
    match acc {
      Some(acc) => (self.0)(acc, value),
      None => Ok(value),
    }
  }
}

/// The `Reduce` operator.
///
/// This struct is created by the `reduce` and `try_reduce` methods on
/// [`PublisherExt`](crate::publisher::PublisherExt).
pub struct Reduce<S, Strategy> {
  source: S,
  strategy: Arc<Strategy>,
}

impl<S: Clone, Strategy> Clone for Reduce<S, Strategy> {
  fn clone(&self) -> Self { Reduce { source: self.source.clone(), strategy: self.strategy.clone() } }
}

impl<S, Strategy> Reduce<S, Strategy> {
  pub fn new(source: S, strategy: Strategy) -> Self { Reduce { source, strategy: Arc::new(strategy) } }
}

impl<S, Strategy> Publisher for Reduce<S, Strategy>
where
  S: Publisher,
  Strategy: ReduceStrategy<S::Item>,
{
  type Item = S::Item;

  fn subscribe(&self, subscriber: SubscriberRef<S::Item>) {
    let operation = ReduceOperation {
      base: OperationBase::new(subscriber),
      strategy: self.strategy.clone(),
      started: AtomicBool::new(false),
      acc: Mutex::new(None),
      _marker: PhantomData,
    };
    self.source.subscribe(OperationHandle::new(operation).into_subscriber());
  }
}

pub struct ReduceOperation<T, Strategy> {
  base: OperationBase<T>,
  strategy: Arc<Strategy>,
  started: AtomicBool,
  acc: Mutex<Option<T>>,
  _marker: PhantomData<fn(T)>,
}

impl<T, Strategy> Operation for ReduceOperation<T, Strategy>
where
  T: Send + 'static,
  Strategy: ReduceStrategy<T>,
{
  type Input = T;
  type Output = T;

  fn base(&self) -> &OperationBase<T> { &self.base }

  fn consume0(&self, item: T) -> Result<(), FlowError> {
    {
      let mut acc = self.acc.lock().unwrap_or_else(PoisonError::into_inner);
      *acc = Some(self.strategy.apply(acc.take(), item)?);
    }
    self.base.request_upstream(1);
    Ok(())
  }

  fn complete0(&self) {
    let acc = self.acc.lock().unwrap_or_else(PoisonError::into_inner).take();
    if let Some(acc) = acc {
      self.base.emit(acc);
    }
    self.base.complete_downstream();
  }

  fn request0(&self, _count: u64) {
    if !self.started.swap(true, Ordering::AcqRel) {
      self.base.request_upstream(1);
    }
  }

  fn abort0(&self) { self.acc.lock().unwrap_or_else(PoisonError::into_inner).take(); }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    prelude::*,
    testing::{TestSubscriber, TestSubscription},
  };

  #[flowable_macro::test]
  fn reduce_sums() {
    let subscriber = TestSubscriber::new(1);
    flowable::from_iter(vec![1, 2, 3, 4]).reduce(|a, b| a + b).subscribe(subscriber.clone());
    assert_eq!(subscriber.items(), vec![10]);
    assert!(subscriber.is_completed());
  }

  #[flowable_macro::test]
  fn reduce_on_empty_only_completes() {
    let subscriber = TestSubscriber::new(1);
    flowable::empty::<i32>().reduce(|a, b| a + b).subscribe(subscriber.clone());
    assert!(subscriber.items().is_empty());
    assert!(subscriber.is_completed());
  }

  #[flowable_macro::test]
  fn pulls_one_item_at_a_time() {
    let downstream = TestSubscriber::new(5);
    let upstream = TestSubscription::new();
    let handle = OperationHandle::new(ReduceOperation {
      base: OperationBase::new(downstream.clone() as SubscriberRef<i32>),
      strategy: Arc::new(ReduceFn(|a: i32, b: i32| a.max(b))),
      started: AtomicBool::new(false),
      acc: Mutex::new(None),
      _marker: PhantomData,
    });
    handle.on_subscribe(upstream.clone());
    downstream.request(3);
    assert_eq!(upstream.requests(), vec![1]);

    handle.consume(4);
    handle.consume(9);
    handle.consume(2);
    assert!(downstream.items().is_empty());
    assert_eq!(upstream.requests(), vec![1, 1, 1, 1]);

    handle.complete();
    assert_eq!(downstream.items(), vec![9]);
    assert_eq!(downstream.terminal_count(), 1);
  }

  #[flowable_macro::test]
  fn combiner_error_fails_once() {
    let subscriber = TestSubscriber::new(1);
    flowable::from_iter(1..=5)
      .try_reduce(|a, b| if b == 3 { Err(FlowError::msg("overflow")) } else { Ok(a + b) })
      .subscribe(subscriber.clone());
    assert!(subscriber.items().is_empty());
    assert_eq!(subscriber.failure().map(|e| e.to_string()), Some("overflow".into()));
    assert_eq!(subscriber.terminal_count(), 1);
  }
}
