//! The production contract and the operator surface.
//!
//! A [`Publisher`] is a cold, reusable stream template: each call to
//! [`subscribe`](Publisher::subscribe) starts an independent subscription.
//! [`PublisherExt`] is implemented for every publisher and provides the
//! chainable operators and the terminal conveniences.
//!
//! ```rust
//! use flowable::prelude::*;
//!
//! let doubled_evens = flowable::from_iter(1..=6)
//!   .filter(|v| v % 2 == 0)
//!   .map(|v| v * 2)
//!   .block_all();
//!
//! assert_eq!(doubled_evens.unwrap(), vec![4, 8, 12]);
//! ```

use std::sync::Arc;

use crate::{
  counter::UNBOUNDED,
  error::{FlowError, Result},
  ops::{
    block::block_all,
    filter::{Filter, FilterFn, TryFilterFn},
    flat_map::{FlatMap, FlatMapFn, TryFlatMapFn},
    into_stream::IntoStream,
    map::{Map, MapFn, TryMapFn},
    reduce::{Reduce, ReduceFn, TryReduceFn},
    subscribe_on::SubscribeOn,
  },
  scheduler::Scheduler,
  subscriber::{FnSubscriber, SubscriberRef},
  subscription::Subscription,
};

/// Producer of a stream of [`Item`](Publisher::Item)s.
pub trait Publisher: Send + Sync {
  type Item: Send + 'static;

  /// Starts a new, independent subscription delivering to `subscriber`.
  fn subscribe(&self, subscriber: SubscriberRef<Self::Item>);
}

/// Shared handle to a type-erased publisher.
pub type BoxPublisher<T> = Arc<dyn Publisher<Item = T>>;

impl<P: Publisher + ?Sized> Publisher for Arc<P> {
  type Item = P::Item;

  #[inline]
  fn subscribe(&self, subscriber: SubscriberRef<Self::Item>) { (**self).subscribe(subscriber) }
}

impl<P: Publisher + ?Sized> Publisher for Box<P> {
  type Item = P::Item;

  #[inline]
  fn subscribe(&self, subscriber: SubscriberRef<Self::Item>) { (**self).subscribe(subscriber) }
}

/// Operators and terminal helpers available on every [`Publisher`].
pub trait PublisherExt: Publisher + Sized + 'static {
  /// Transforms each item with `f`, one output per input.
  fn map<R, F>(self, f: F) -> Map<Self, MapFn<F>>
  where
    F: Fn(Self::Item) -> R + Send + Sync + 'static,
    R: Send + 'static,
  {
    Map::new(self, MapFn(f))
  }

  /// Like [`map`](PublisherExt::map), but an `Err` fails the stream and
  /// cancels the upstream.
  fn try_map<R, F>(self, f: F) -> Map<Self, TryMapFn<F>>
  where
    F: Fn(Self::Item) -> Result<R> + Send + Sync + 'static,
    R: Send + 'static,
  {
    Map::new(self, TryMapFn(f))
  }

  /// Keeps only the items for which `predicate` holds.
  fn filter<F>(self, predicate: F) -> Filter<Self, FilterFn<F>>
  where
    F: Fn(&Self::Item) -> bool + Send + Sync + 'static,
  {
    Filter::new(self, FilterFn(predicate))
  }

  /// Like [`filter`](PublisherExt::filter) with a fallible predicate.
  fn try_filter<F>(self, predicate: F) -> Filter<Self, TryFilterFn<F>>
  where
    F: Fn(&Self::Item) -> Result<bool> + Send + Sync + 'static,
  {
    Filter::new(self, TryFilterFn(predicate))
  }

  /// Folds the whole stream into a single item, starting from the first one.
  /// An empty upstream completes without emitting anything.
  fn reduce<F>(self, f: F) -> Reduce<Self, ReduceFn<F>>
  where
    F: Fn(Self::Item, Self::Item) -> Self::Item + Send + Sync + 'static,
  {
    Reduce::new(self, ReduceFn(f))
  }

  /// Like [`reduce`](PublisherExt::reduce) with a fallible combiner.
  fn try_reduce<F>(self, f: F) -> Reduce<Self, TryReduceFn<F>>
  where
    F: Fn(Self::Item, Self::Item) -> Result<Self::Item> + Send + Sync + 'static,
  {
    Reduce::new(self, TryReduceFn(f))
  }

  /// Maps each item to an inner publisher and concatenates the inner streams,
  /// draining each one before the next outer item is requested.
  fn flat_map<P, F>(self, f: F) -> FlatMap<Self, FlatMapFn<F>>
  where
    F: Fn(Self::Item) -> P + Send + Sync + 'static,
    P: Publisher + 'static,
  {
    FlatMap::new(self, FlatMapFn(f))
  }

  /// Like [`flat_map`](PublisherExt::flat_map) with a fallible mapping.
  fn try_flat_map<P, F>(self, f: F) -> FlatMap<Self, TryFlatMapFn<F>>
  where
    F: Fn(Self::Item) -> Result<P> + Send + Sync + 'static,
    P: Publisher + 'static,
  {
    FlatMap::new(self, TryFlatMapFn(f))
  }

  /// Subscribes to this publisher on a task of `scheduler`.
  fn subscribe_on<S>(self, scheduler: S) -> SubscribeOn<Self, S>
  where
    S: Scheduler + 'static,
  {
    SubscribeOn::new(self, scheduler)
  }

  /// Subscribes with four callbacks instead of a [`Subscriber`] object.
  ///
  /// Nothing is requested automatically: `on_subscribed` (or `on_consumed`)
  /// must call `request` on the handle it receives.
  ///
  /// [`Subscriber`]: crate::subscriber::Subscriber
  fn subscribe_all<S, N, C, E>(&self, on_subscribed: S, on_consumed: N, on_completed: C, on_failed: E)
  where
    S: Fn(&dyn Subscription) + Send + Sync + 'static,
    N: Fn(&dyn Subscription, Self::Item) + Send + Sync + 'static,
    C: Fn() + Send + Sync + 'static,
    E: Fn(FlowError) + Send + Sync + 'static,
  {
    self.subscribe(Arc::new(FnSubscriber::new(on_subscribed, on_consumed, on_completed, on_failed)));
  }

  /// Requests everything and hands each item to `f`. Failures are logged and
  /// otherwise dropped.
  fn for_each<F>(&self, f: F)
  where
    F: Fn(Self::Item) + Send + Sync + 'static,
  {
    self.subscribe_all(
      |s: &dyn Subscription| s.request(UNBOUNDED),
      move |_: &dyn Subscription, item| f(item),
      || {},
      |cause| tracing::debug!(error = %cause, "for_each subscription failed"),
    );
  }

  /// Blocks the calling thread until the stream terminates and returns every
  /// item, or the failure.
  ///
  /// Never call this from a thread the stream itself needs in order to make
  /// progress.
  fn block_all(&self) -> Result<Vec<Self::Item>> { block_all(self) }

  /// Bridges into a [`futures::Stream`], requesting `prefetch` items up front
  /// and one more for every item polled.
  fn into_stream(self, prefetch: u64) -> IntoStream<Self::Item> { IntoStream::new(&self, prefetch) }

  /// Erases the concrete publisher type.
  fn boxed(self) -> BoxPublisher<Self::Item> { Arc::new(self) }
}

impl<P: Publisher + Sized + 'static> PublisherExt for P {}
