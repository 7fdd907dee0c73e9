//! Map operator implementation
//!
//! `Map` transforms every upstream item into exactly one downstream item. It
//! never adjusts demand: every downstream `request(n)` is forwarded upstream
//! unchanged.

use std::{marker::PhantomData, sync::Arc};

use crate::{
  error::FlowError,
  operation::{Operation, OperationBase, OperationHandle},
  publisher::Publisher,
  subscriber::SubscriberRef,
};

/// Defines how one upstream item is turned into one downstream item.
pub trait MapStrategy<Item>: Send + Sync + 'static {
  type Output: Send + 'static;

  fn apply(&self, item: Item) -> Result<Self::Output, FlowError>;
}

/// Strategy for `map` (infallible).
#[derive(Clone)]
pub struct MapFn<F>(pub F);

impl<F, Item, R> MapStrategy<Item> for MapFn<F>
where
  F: Fn(Item) -> R + Send + Sync + 'static,
  R: Send + 'static,
{
  type Output = R;

  #[inline]
  fn apply(&self, item: Item) -> Result<R, FlowError> { Ok((self.0)(item)) }
}

/// Strategy for `try_map`.
#[derive(Clone)]
pub struct TryMapFn<F>(pub F);

impl<F, Item, R> MapStrategy<Item> for TryMapFn<F>
where
  F: Fn(Item) -> Result<R, FlowError> + Send + Sync + 'static,
  R: Send + 'static,
{
  type Output = R;

  #[inline]
  fn apply(&self, item: Item) -> Result<R, FlowError> { (self.0)(item) }
}

/// The `Map` operator.
///
/// This struct is created by the `map` and `try_map` methods on
/// [`PublisherExt`](crate::publisher::PublisherExt).
pub struct Map<S, M> {
  source: S,
  strategy: Arc<M>,
}

impl<S: Clone, M> Clone for Map<S, M> {
  fn clone(&self) -> Self { Map { source: self.source.clone(), strategy: self.strategy.clone() } }
}

impl<S, M> Map<S, M> {
  pub fn new(source: S, strategy: M) -> Self { Map { source, strategy: Arc::new(strategy) } }
}

impl<S, M> Publisher for Map<S, M>
where
  S: Publisher,
  M: MapStrategy<S::Item>,
{
  type Item = M::Output;

  fn subscribe(&self, subscriber: SubscriberRef<Self::Item>) {
    let operation =
      MapOperation { base: OperationBase::new(subscriber), strategy: self.strategy.clone(), _marker: PhantomData };
    self.source.subscribe(OperationHandle::new(operation).into_subscriber());
  }
}

pub struct MapOperation<T, M: MapStrategy<T>> {
  base: OperationBase<M::Output>,
  strategy: Arc<M>,
  _marker: PhantomData<fn(T)>,
}

impl<T, M> Operation for MapOperation<T, M>
where
  T: 'static,
  M: MapStrategy<T>,
{
  type Input = T;
  type Output = M::Output;

  fn base(&self) -> &OperationBase<M::Output> { &self.base }

  fn consume0(&self, item: T) -> Result<(), FlowError> {
    let mapped = self.strategy.apply(item)?;
    self.base.emit(mapped);
    Ok(())
  }
}
