//! Filter operator implementation
//!
//! Items failing the predicate are dropped, and each drop is paid back with an
//! extra `request(1)` upstream so the downstream still receives everything it
//! asked for.

use std::{marker::PhantomData, sync::Arc};

use crate::{
  error::FlowError,
  operation::{Operation, OperationBase, OperationHandle},
  publisher::Publisher,
  subscriber::SubscriberRef,
};

/// Decides whether an item passes.
pub trait FilterStrategy<Item>: Send + Sync + 'static {
  fn test(&self, item: &Item) -> Result<bool, FlowError>;
}

/// Strategy for `filter`.
#[derive(Clone)]
pub struct FilterFn<F>(pub F);

impl<F, Item> FilterStrategy<Item> for FilterFn<F>
where
  F: Fn(&Item) -> bool + Send + Sync + 'static,
{
  #[inline]
  fn test(&self, item: &Item) -> Result<bool, FlowError> { Ok((self.0)(item)) }
}

/// Strategy for `try_filter`.
#[derive(Clone)]
pub struct TryFilterFn<F>(pub F);

impl<F, Item> FilterStrategy<Item> for TryFilterFn<F>
where
  F: Fn(&Item) -> Result<bool, FlowError> + Send + Sync + 'static,
{
  #[inline]
  fn test(&self, item: &Item) -> Result<bool, FlowError> { (self.0)(item) }
}

/// The `Filter` operator.
///
/// This struct is created by the `filter` and `try_filter` methods on
/// [`PublisherExt`](crate::publisher::PublisherExt).
pub struct Filter<S, P> {
  source: S,
  predicate: Arc<P>,
}

impl<S: Clone, P> Clone for Filter<S, P> {
  fn clone(&self) -> Self { Filter { source: self.source.clone(), predicate: self.predicate.clone() } }
}

impl<S, P> Filter<S, P> {
  pub fn new(source: S, predicate: P) -> Self { Filter { source, predicate: Arc::new(predicate) } }
}

impl<S, P> Publisher for Filter<S, P>
where
  S: Publisher,
  P: FilterStrategy<S::Item>,
{
  type Item = S::Item;

  fn subscribe(&self, subscriber: SubscriberRef<S::Item>) {
    let operation =
      FilterOperation { base: OperationBase::new(subscriber), predicate: self.predicate.clone(), _marker: PhantomData };
    self.source.subscribe(OperationHandle::new(operation).into_subscriber());
  }
}

pub struct FilterOperation<T, P> {
  base: OperationBase<T>,
  predicate: Arc<P>,
  _marker: PhantomData<fn(T)>,
}

impl<T, P> Operation for FilterOperation<T, P>
where
  T: Send + 'static,
  P: FilterStrategy<T>,
{
  type Input = T;
  type Output = T;

  fn base(&self) -> &OperationBase<T> { &self.base }

  fn consume0(&self, item: T) -> Result<(), FlowError> {
    if self.predicate.test(&item)? {
      self.base.emit(item);
    } else {
      self.base.request_upstream(1);
    }
    Ok(())
  }
}
