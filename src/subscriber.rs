//! The consumption contract.
//!
//! A [`Subscriber`] receives exactly one `on_subscribe`, then any number of
//! `consume` calls bounded by the demand it requested, then at most one of
//! `complete` / `fail`. Subscribers are shared between the producing and the
//! requesting side, so every callback takes `&self`.

use std::{
  marker::PhantomData,
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
  },
};

use once_cell::sync::OnceCell;

use crate::{
  error::FlowError,
  subscription::{Subscription, SubscriptionRef},
};

/// Consumer of a stream of `T`.
pub trait Subscriber<T>: Send + Sync {
  /// Receives the control handle of this subscription. No item is delivered
  /// before this call.
  fn on_subscribe(&self, subscription: SubscriptionRef);

  /// Receives the next item.
  fn consume(&self, item: T);

  /// The stream finished normally.
  fn complete(&self);

  /// The stream finished with an error.
  fn fail(&self, cause: FlowError);
}

/// Shared handle to a type-erased subscriber.
pub type SubscriberRef<T> = Arc<dyn Subscriber<T>>;

// ============================================================================
// FnSubscriber - Closure adapter
// ============================================================================

/// Terminal subscriber built from four closures.
///
/// `on_subscribed` and `on_consumed` are handed the subscription so they can
/// pull more items or cancel. Only the first terminal signal is forwarded.
pub struct FnSubscriber<T, S, N, C, E> {
  on_subscribed: S,
  on_consumed: N,
  on_completed: C,
  on_failed: E,
  subscription: OnceCell<SubscriptionRef>,
  terminated: AtomicBool,
  _marker: PhantomData<fn(T)>,
}

impl<T, S, N, C, E> FnSubscriber<T, S, N, C, E>
where
  S: Fn(&dyn Subscription) + Send + Sync,
  N: Fn(&dyn Subscription, T) + Send + Sync,
  C: Fn() + Send + Sync,
  E: Fn(FlowError) + Send + Sync,
{
  pub fn new(on_subscribed: S, on_consumed: N, on_completed: C, on_failed: E) -> Self {
    FnSubscriber {
      on_subscribed,
      on_consumed,
      on_completed,
      on_failed,
      subscription: OnceCell::new(),
      terminated: AtomicBool::new(false),
      _marker: PhantomData,
    }
  }

  #[inline]
  fn terminate(&self) -> bool { !self.terminated.swap(true, Ordering::AcqRel) }
}

impl<T, S, N, C, E> Subscriber<T> for FnSubscriber<T, S, N, C, E>
where
  S: Fn(&dyn Subscription) + Send + Sync,
  N: Fn(&dyn Subscription, T) + Send + Sync,
  C: Fn() + Send + Sync,
  E: Fn(FlowError) + Send + Sync,
{
  fn on_subscribe(&self, subscription: SubscriptionRef) {
    if let Err(duplicate) = self.subscription.set(subscription) {
      duplicate.cancel();
      return;
    }
    if let Some(subscription) = self.subscription.get() {
      (self.on_subscribed)(subscription.as_ref());
    }
  }

  fn consume(&self, item: T) {
    if self.terminated.load(Ordering::Acquire) {
      return;
    }
    if let Some(subscription) = self.subscription.get() {
      (self.on_consumed)(subscription.as_ref(), item);
    }
  }

  fn complete(&self) {
    if self.terminate() {
      (self.on_completed)();
    }
  }

  fn fail(&self, cause: FlowError) {
    if self.terminate() {
      (self.on_failed)(cause);
    }
  }
}
