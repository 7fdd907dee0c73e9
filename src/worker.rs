//! Driver of one inner publisher on behalf of a flattening operation.
//!
//! A [`Worker`] subscribes to an inner publisher and relays its signals to the
//! [`WorkerObserver`] that owns it, tagged with the worker's id so the owner
//! can discard reports from a worker it no longer considers current. Demand
//! handed to the worker before the inner subscription arrives is held back
//! and replayed once it does.

use std::sync::{
  atomic::{AtomicBool, Ordering},
  Arc, Weak,
};

use tracing::{trace, warn};

use crate::{
  error::FlowError,
  publisher::Publisher,
  subscriber::Subscriber,
  subscription::{DeferredSubscription, Subscription, SubscriptionRef},
};

/// Receives what a [`Worker`] observes on its inner stream.
pub trait WorkerObserver<R>: Send + Sync {
  fn on_worker_consumed(&self, item: R, id: u64);

  fn on_worker_completed(&self, id: u64);

  fn on_worker_failed(&self, cause: FlowError, id: u64);
}

pub struct Worker<R> {
  id: u64,
  owner: Weak<dyn WorkerObserver<R>>,
  subscription: DeferredSubscription,
  terminated: AtomicBool,
}

impl<R> Worker<R> {
  #[inline]
  pub fn id(&self) -> u64 { self.id }

  #[inline]
  pub fn is_terminated(&self) -> bool { self.terminated.load(Ordering::Acquire) }
}

impl<R: Send + 'static> Worker<R> {
  pub fn new(id: u64, owner: Weak<dyn WorkerObserver<R>>) -> Arc<Self> {
    Arc::new(Worker { id, owner, subscription: DeferredSubscription::new(), terminated: AtomicBool::new(false) })
  }

  /// Subscribes this worker to `inner`.
  pub fn run<P>(self: &Arc<Self>, inner: &P)
  where
    P: Publisher<Item = R> + ?Sized,
  {
    trace!(worker = self.id, "worker started");
    inner.subscribe(self.clone());
  }

  /// Asks the inner stream for `count` more items.
  pub fn request(&self, count: u64) {
    if !self.is_terminated() {
      self.subscription.request(count);
    }
  }

  /// Stops the inner stream. Nothing is reported to the owner afterwards.
  pub fn cancel(&self) {
    if !self.terminated.swap(true, Ordering::AcqRel) {
      trace!(worker = self.id, "worker cancelled");
    }
    self.subscription.cancel();
  }

  fn terminate(&self) -> bool { !self.terminated.swap(true, Ordering::AcqRel) }
}

impl<R: Send + 'static> Subscriber<R> for Worker<R> {
  fn on_subscribe(&self, subscription: SubscriptionRef) {
    if !self.subscription.set(subscription) {
      warn!(worker = self.id, "duplicate on_subscribe, extra subscription cancelled");
    }
  }

  fn consume(&self, item: R) {
    if self.is_terminated() {
      return;
    }
    if let Some(owner) = self.owner.upgrade() {
      owner.on_worker_consumed(item, self.id);
    }
  }

  fn complete(&self) {
    if !self.terminate() {
      return;
    }
    trace!(worker = self.id, "worker completed");
    if let Some(owner) = self.owner.upgrade() {
      owner.on_worker_completed(self.id);
    }
  }

  fn fail(&self, cause: FlowError) {
    if !self.terminate() {
      return;
    }
    trace!(worker = self.id, error = %cause, "worker failed");
    if let Some(owner) = self.owner.upgrade() {
      owner.on_worker_failed(cause, self.id);
    }
  }
}
