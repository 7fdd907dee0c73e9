//! Publisher factories.
//!
//! Every factory returns a cold publisher: each subscription gets its own
//! copy of the data and its own demand accounting. Items are produced only
//! against outstanding demand; a source that runs dry completes right away,
//! without waiting for another `request`.
//!
//! | Function | Items | Terminal |
//! |----------|-------|----------|
//! | [`from_iter`] | every item of the iterable | complete |
//! | [`just`] | one | complete |
//! | [`empty`] | none | complete, without any request |
//! | [`error`] | none | fail, without any request |
//! | [`never`] | none | none |
//! | [`create`] | whatever the producer emits | whatever the producer signals |
//!
//! ```rust
//! use flowable::prelude::*;
//!
//! assert_eq!(flowable::just("hi").block_all().unwrap(), vec!["hi"]);
//! assert!(flowable::empty::<u8>().block_all().unwrap().is_empty());
//! assert!(flowable::error::<u8>(FlowError::msg("down")).block_all().is_err());
//! ```

use std::{
  iter::{Empty, Once, Peekable},
  marker::PhantomData,
  sync::{Arc, Mutex, PoisonError},
};

pub use crate::emitter::{create, Create};
use crate::{
  error::FlowError,
  publisher::Publisher,
  pump::{Pump, Source},
  subscriber::SubscriberRef,
};

// ============================================================================
// from_iter / just / empty
// ============================================================================

/// Publisher over a cloneable iterable, restarted for every subscription.
#[derive(Clone)]
pub struct FromIter<I> {
  iter: I,
}

/// Emits every item of `iter`, then completes.
///
/// Completion is detected by peeking, so the iterator is always advanced one
/// element ahead of the delivered items. A lazy iterator with side effects
/// runs them for the next element before any demand exists for it.
pub fn from_iter<I>(iter: I) -> FromIter<I>
where
  I: IntoIterator + Clone + Send + Sync + 'static,
  I::IntoIter: Send + 'static,
  I::Item: Send + 'static,
{
  FromIter { iter }
}

/// Emits `item`, then completes.
pub fn just<T>(item: T) -> FromIter<Once<T>>
where
  T: Clone + Send + Sync + 'static,
{
  from_iter(std::iter::once(item))
}

/// Completes without emitting.
pub fn empty<T>() -> FromIter<Empty<T>>
where
  T: Send + 'static,
{
  from_iter(std::iter::empty())
}

struct IterSource<I: Iterator> {
  iter: Mutex<Peekable<I>>,
}

impl<I> Source for IterSource<I>
where
  I: Iterator + Send + 'static,
  I::Item: Send + 'static,
{
  type Item = I::Item;

  fn next_item(&self) -> Option<I::Item> { self.iter.lock().unwrap_or_else(PoisonError::into_inner).next() }

  fn finished(&self) -> Option<Result<(), FlowError>> {
    let mut iter = self.iter.lock().unwrap_or_else(PoisonError::into_inner);
    iter.peek().is_none().then_some(Ok(()))
  }
}

impl<I> Publisher for FromIter<I>
where
  I: IntoIterator + Clone + Send + Sync + 'static,
  I::IntoIter: Send + 'static,
  I::Item: Send + 'static,
{
  type Item = I::Item;

  fn subscribe(&self, subscriber: SubscriberRef<Self::Item>) {
    let source = IterSource { iter: Mutex::new(self.iter.clone().into_iter().peekable()) };
    Pump::start(Arc::new(Pump::new(source, subscriber)));
  }
}

// ============================================================================
// error / never
// ============================================================================

/// Publisher that fails every subscription with the same error.
pub struct Fail<T> {
  cause: FlowError,
  _marker: PhantomData<fn() -> T>,
}

/// Fails immediately with `cause`.
pub fn error<T: Send + 'static>(cause: FlowError) -> Fail<T> { Fail { cause, _marker: PhantomData } }

struct FailSource<T> {
  cause: FlowError,
  _marker: PhantomData<fn() -> T>,
}

impl<T: Send + 'static> Source for FailSource<T> {
  type Item = T;

  fn next_item(&self) -> Option<T> { None }

  fn finished(&self) -> Option<Result<(), FlowError>> { Some(Err(self.cause.clone())) }
}

impl<T: Send + 'static> Publisher for Fail<T> {
  type Item = T;

  fn subscribe(&self, subscriber: SubscriberRef<T>) {
    let source = FailSource { cause: self.cause.clone(), _marker: PhantomData };
    Pump::start(Arc::new(Pump::new(source, subscriber)));
  }
}

/// Publisher that never emits and never terminates.
pub struct Never<T>(PhantomData<fn() -> T>);

/// Never emits, never terminates; only cancellation ends it.
pub fn never<T: Send + 'static>() -> Never<T> { Never(PhantomData) }

impl<T: Send + 'static> Source for Never<T> {
  type Item = T;

  fn next_item(&self) -> Option<T> { None }

  fn finished(&self) -> Option<Result<(), FlowError>> { None }
}

impl<T: Send + 'static> Publisher for Never<T> {
  type Item = T;

  fn subscribe(&self, subscriber: SubscriberRef<T>) {
    Pump::start(Arc::new(Pump::new(Never(PhantomData), subscriber)));
  }
}
