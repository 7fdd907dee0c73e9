//! The consumer-to-producer control channel.
//!
//! A [`Subscription`] is handed to a subscriber in `on_subscribe`; the
//! subscriber pulls items with [`request`](Subscription::request) and stops the
//! stream with [`cancel`](Subscription::cancel). Both may be called from any
//! thread, any number of times.

use std::{
  fmt::{Debug, Formatter},
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
  },
};

use once_cell::sync::OnceCell;

use crate::counter::Counter;

/// Control handle for one subscription.
pub trait Subscription: Send + Sync {
  /// Signals willingness to receive up to `count` more items. A count of
  /// [`UNBOUNDED`](crate::counter::UNBOUNDED) disables backpressure.
  fn request(&self, count: u64);

  /// Irrevocably stops the stream. Idempotent.
  fn cancel(&self);

  /// Whether `cancel` has been observed.
  fn is_cancelled(&self) -> bool;
}

/// Shared handle to a type-erased subscription.
pub type SubscriptionRef = Arc<dyn Subscription>;

impl<S: Subscription + ?Sized> Subscription for Arc<S> {
  #[inline]
  fn request(&self, count: u64) { (**self).request(count) }
  #[inline]
  fn cancel(&self) { (**self).cancel() }
  #[inline]
  fn is_cancelled(&self) -> bool { (**self).is_cancelled() }
}

impl<S: Subscription + ?Sized> Subscription for Box<S> {
  #[inline]
  fn request(&self, count: u64) { (**self).request(count) }
  #[inline]
  fn cancel(&self) { (**self).cancel() }
  #[inline]
  fn is_cancelled(&self) -> bool { (**self).is_cancelled() }
}

impl Debug for dyn Subscription {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("dyn Subscription")
      .field("is_cancelled", &self.is_cancelled())
      .finish()
  }
}

// ============================================================================
// EmptySubscription
// ============================================================================

/// A subscription with nothing behind it, used when a stream terminates
/// before any item can be produced.
#[derive(Debug, Default)]
pub struct EmptySubscription {
  cancelled: AtomicBool,
}

impl EmptySubscription {
  pub fn new() -> Self { Self::default() }

  pub fn shared() -> SubscriptionRef { Arc::new(Self::default()) }
}

impl Subscription for EmptySubscription {
  fn request(&self, _count: u64) {}

  fn cancel(&self) { self.cancelled.store(true, Ordering::Release); }

  fn is_cancelled(&self) -> bool { self.cancelled.load(Ordering::Acquire) }
}

// ============================================================================
// DeferredSubscription
// ============================================================================

/// A subscription slot that accepts `request`/`cancel` before the real
/// upstream subscription has arrived.
///
/// Demand requested early is accumulated and replayed exactly once when
/// [`set`](DeferredSubscription::set) installs the upstream; a cancel
/// recorded early cancels the upstream as soon as it shows up.
#[derive(Default)]
pub struct DeferredSubscription {
  upstream: OnceCell<SubscriptionRef>,
  missed: Counter,
  cancelled: AtomicBool,
}

impl DeferredSubscription {
  pub fn new() -> Self { Self::default() }

  /// Installs the upstream subscription.
  ///
  /// Returns `false` (and cancels `upstream`) if a subscription was already
  /// installed.
  pub fn set(&self, upstream: SubscriptionRef) -> bool {
    if self.upstream.set(upstream.clone()).is_err() {
      upstream.cancel();
      return false;
    }
    if self.is_cancelled() {
      upstream.cancel();
      return true;
    }
    let missed = self.missed.take();
    if missed > 0 {
      upstream.request(missed);
    }
    true
  }

  pub fn is_set(&self) -> bool { self.upstream.get().is_some() }
}

impl Subscription for DeferredSubscription {
  fn request(&self, count: u64) {
    if self.is_cancelled() {
      return;
    }
    if let Some(upstream) = self.upstream.get() {
      upstream.request(count);
      return;
    }
    self.missed.increase(count);
    // `set` may have run between the check above and the increase.
    if let Some(upstream) = self.upstream.get() {
      let missed = self.missed.take();
      if missed > 0 {
        upstream.request(missed);
      }
    }
  }

  fn cancel(&self) {
    if !self.cancelled.swap(true, Ordering::AcqRel) {
      if let Some(upstream) = self.upstream.get() {
        upstream.cancel();
      }
    }
  }

  fn is_cancelled(&self) -> bool { self.cancelled.load(Ordering::Acquire) }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use super::*;

  #[derive(Default)]
  struct Recording {
    requests: Mutex<Vec<u64>>,
    cancelled: AtomicBool,
  }

  impl Subscription for Recording {
    fn request(&self, count: u64) { self.requests.lock().unwrap().push(count); }
    fn cancel(&self) { self.cancelled.store(true, Ordering::SeqCst); }
    fn is_cancelled(&self) -> bool { self.cancelled.load(Ordering::SeqCst) }
  }

  #[flowable_macro::test]
  fn replays_early_demand_once() {
    let deferred = DeferredSubscription::new();
    deferred.request(2);
    deferred.request(3);
    let upstream = Arc::new(Recording::default());
    assert!(deferred.set(upstream.clone()));
    deferred.request(1);
    assert_eq!(*upstream.requests.lock().unwrap(), vec![5, 1]);
  }

  #[flowable_macro::test]
  fn early_cancel_reaches_late_upstream() {
    let deferred = DeferredSubscription::new();
    deferred.cancel();
    deferred.request(4);
    let upstream = Arc::new(Recording::default());
    deferred.set(upstream.clone());
    assert!(upstream.is_cancelled());
    assert!(upstream.requests.lock().unwrap().is_empty());
  }

  #[flowable_macro::test]
  fn second_upstream_is_rejected() {
    let deferred = DeferredSubscription::new();
    let first = Arc::new(Recording::default());
    let second = Arc::new(Recording::default());
    assert!(deferred.set(first.clone()));
    assert!(!deferred.set(second.clone()));
    assert!(second.is_cancelled());
    assert!(!first.is_cancelled());
  }

  #[flowable_macro::test]
  fn empty_subscription_only_tracks_cancel() {
    let empty = EmptySubscription::new();
    empty.request(10);
    assert!(!empty.is_cancelled());
    empty.cancel();
    empty.cancel();
    assert!(empty.is_cancelled());
  }
}
