//! The adapter between one upstream subscription and one downstream
//! subscriber.
//!
//! Every operator is an [`Operation`]: it composes an [`OperationBase`] that
//! owns the upstream handle, the downstream subscriber and the terminal state,
//! and overrides only the hooks its policy needs. [`OperationHandle`] turns an
//! operation into both the [`Subscriber`] its upstream talks to and the
//! [`Subscription`] its downstream talks to, and is the single place where
//! cancellation and failure short-circuit both directions.
//!
//! Downstream signals are serialized. An operation may hear from more than
//! one upstream on more than one thread (`flat_map` has the outer stream and
//! the active inner one), so items and the terminal signal are queued and
//! delivered by whichever thread holds the drain, one at a time. A terminal
//! signal queued while an item is being delivered waits for that delivery.

use std::{
  any::type_name,
  collections::VecDeque,
  sync::{
    atomic::{AtomicU8, Ordering},
    Arc, Mutex, MutexGuard, PoisonError, Weak,
  },
};

use tracing::{debug, warn};

use crate::{
  counter::WorkInProgress,
  error::FlowError,
  subscriber::{Subscriber, SubscriberRef},
  subscription::{Subscription, SubscriptionRef},
};

const ACTIVE: u8 = 0;
const COMPLETED: u8 = 1;
const FAILED: u8 = 2;
const CANCELLED: u8 = 3;

/// Operator policy plugged into an [`OperationHandle`].
pub trait Operation: Send + Sync + 'static {
  type Input;
  type Output: Send + 'static;

  fn base(&self) -> &OperationBase<Self::Output>;

  /// Handles one upstream item. Returning `Err` cancels the upstream and fails
  /// the downstream.
  fn consume0(&self, item: Self::Input) -> Result<(), FlowError>;

  /// Handles upstream completion.
  fn complete0(&self) { self.base().complete_downstream(); }

  /// Handles downstream demand. `count` is always positive.
  fn request0(&self, count: u64) { self.base().request_upstream(count); }

  /// Stops any in-flight work owned by the operation. Called once the
  /// subscription is cancelled or failed.
  fn abort0(&self) {}
}

// ============================================================================
// OperationBase
// ============================================================================

/// A downstream signal waiting for delivery.
enum Delivery<R> {
  Item(R),
  Complete,
  Fail(FlowError),
}

/// Upstream handle, downstream subscriber and terminal flag shared by all
/// operators.
pub struct OperationBase<R> {
  upstream: Mutex<Option<SubscriptionRef>>,
  downstream: SubscriberRef<R>,
  state: AtomicU8,
  pending: Mutex<VecDeque<Delivery<R>>>,
  wip: WorkInProgress,
}

impl<R: Send + 'static> OperationBase<R> {
  pub fn new(downstream: SubscriberRef<R>) -> Self {
    OperationBase {
      upstream: Mutex::new(None),
      downstream,
      state: AtomicU8::new(ACTIVE),
      pending: Mutex::new(VecDeque::new()),
      wip: WorkInProgress::new(),
    }
  }

  #[inline]
  pub fn is_active(&self) -> bool { self.state.load(Ordering::Acquire) == ACTIVE }

  #[inline]
  pub fn is_cancelled(&self) -> bool { self.state.load(Ordering::Acquire) == CANCELLED }

  pub fn downstream(&self) -> &SubscriberRef<R> { &self.downstream }

  /// Current upstream subscription, `None` before `on_subscribe` and after
  /// termination.
  pub fn upstream(&self) -> Option<SubscriptionRef> {
    self.upstream.lock().unwrap_or_else(PoisonError::into_inner).clone()
  }

  /// Forwards demand upstream while the operation is active.
  pub fn request_upstream(&self, count: u64) {
    if !self.is_active() {
      return;
    }
    if let Some(upstream) = self.upstream() {
      upstream.request(count);
    }
  }

  /// Delivers `item` downstream unless the operation already terminated.
  pub fn emit(&self, item: R) {
    {
      let mut pending = self.pending();
      // Checked under the queue lock: a terminal signal is always queued
      // after an item that saw the operation active.
      if !self.is_active() {
        return;
      }
      pending.push_back(Delivery::Item(item));
    }
    self.drain();
  }

  /// Completes the downstream once queued items are delivered. Returns
  /// `false` if a terminal signal was already issued.
  pub fn complete_downstream(&self) -> bool {
    if !self.transition(COMPLETED) {
      return false;
    }
    self.release_upstream();
    self.deliver(Delivery::Complete);
    true
  }

  /// Fails the downstream after the upstream itself failed.
  pub fn fail_downstream(&self, cause: FlowError) -> bool {
    if !self.transition(FAILED) {
      return false;
    }
    self.release_upstream();
    self.deliver(Delivery::Fail(cause));
    true
  }

  /// Cancels the upstream, then fails the downstream. Used when the failure
  /// originates inside the operation.
  pub fn fail_all(&self, cause: FlowError) -> bool {
    if !self.transition(FAILED) {
      return false;
    }
    if let Some(upstream) = self.release_upstream() {
      upstream.cancel();
    }
    self.deliver(Delivery::Fail(cause));
    true
  }

  fn attach(&self, upstream: SubscriptionRef) -> bool {
    let mut slot = self.upstream.lock().unwrap_or_else(PoisonError::into_inner);
    if slot.is_some() || !self.is_active() {
      drop(slot);
      upstream.cancel();
      return false;
    }
    *slot = Some(upstream);
    true
  }

  fn cancel(&self) -> bool {
    if !self.transition(CANCELLED) {
      return false;
    }
    if let Some(upstream) = self.release_upstream() {
      upstream.cancel();
    }
    true
  }

  fn pending(&self) -> MutexGuard<'_, VecDeque<Delivery<R>>> {
    self.pending.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn deliver(&self, signal: Delivery<R>) {
    self.pending().push_back(signal);
    self.drain();
  }

  /// Delivers queued signals, or leaves them to the thread already doing so.
  fn drain(&self) {
    if !self.wip.enter() {
      return;
    }
    let mut missed = 1;
    loop {
      loop {
        let Some(signal) = self.pending().pop_front() else { break };
        match signal {
          Delivery::Item(item) => {
            if !self.is_cancelled() {
              self.downstream.consume(item);
            }
          }
          Delivery::Complete => self.downstream.complete(),
          Delivery::Fail(cause) => self.downstream.fail(cause),
        }
      }
      missed = self.wip.leave(missed);
      if missed == 0 {
        break;
      }
    }
  }

  fn release_upstream(&self) -> Option<SubscriptionRef> {
    self.upstream.lock().unwrap_or_else(PoisonError::into_inner).take()
  }

  #[inline]
  fn transition(&self, terminal: u8) -> bool {
    self
      .state
      .compare_exchange(ACTIVE, terminal, Ordering::AcqRel, Ordering::Acquire)
      .is_ok()
  }
}

// ============================================================================
// OperationHandle
// ============================================================================

/// Exposes an [`Operation`] as the upstream's subscriber and the downstream's
/// subscription.
pub struct OperationHandle<Op>(Arc<Op>);

impl<Op> Clone for OperationHandle<Op> {
  #[inline]
  fn clone(&self) -> Self { OperationHandle(self.0.clone()) }
}

impl<Op: Operation> OperationHandle<Op> {
  pub fn new(operation: Op) -> Self { OperationHandle(Arc::new(operation)) }

  /// Builds an operation that keeps a weak reference to itself, for
  /// operations that register callbacks with helpers they own.
  pub fn cyclic(build: impl FnOnce(&Weak<Op>) -> Op) -> Self { OperationHandle(Arc::new_cyclic(build)) }

  pub fn operation(&self) -> &Op { &self.0 }

  /// Type-erased subscriber handle, ready to pass to an upstream publisher.
  pub fn into_subscriber(self) -> SubscriberRef<Op::Input>
  where
    Op::Input: 'static,
  {
    Arc::new(self)
  }

  fn short_circuit(&self, cause: FlowError) {
    debug!(operation = type_name::<Op>(), error = %cause, "operation failed, cancelling upstream");
    self.0.abort0();
    self.0.base().fail_all(cause);
  }
}

impl<Op: Operation> Subscriber<Op::Input> for OperationHandle<Op> {
  fn on_subscribe(&self, subscription: SubscriptionRef) {
    if !self.0.base().attach(subscription) {
      warn!(operation = type_name::<Op>(), "duplicate on_subscribe, extra subscription cancelled");
      return;
    }
    let handle: SubscriptionRef = Arc::new(self.clone());
    self.0.base().downstream().on_subscribe(handle);
  }

  fn consume(&self, item: Op::Input) {
    if !self.0.base().is_active() {
      return;
    }
    if let Err(cause) = self.0.consume0(item) {
      self.short_circuit(cause);
    }
  }

  fn complete(&self) {
    if self.0.base().is_active() {
      self.0.complete0();
    }
  }

  fn fail(&self, cause: FlowError) {
    if self.0.base().is_active() {
      self.0.abort0();
      self.0.base().fail_downstream(cause);
    }
  }
}

impl<Op: Operation> Subscription for OperationHandle<Op> {
  fn request(&self, count: u64) {
    if !self.0.base().is_active() {
      return;
    }
    if count == 0 {
      warn!(operation = type_name::<Op>(), "request(0) is a protocol violation");
      self.short_circuit(FlowError::InvalidDemand(count));
      return;
    }
    self.0.request0(count);
  }

  fn cancel(&self) {
    if self.0.base().cancel() {
      debug!(operation = type_name::<Op>(), "cancelled");
      self.0.abort0();
    }
  }

  fn is_cancelled(&self) -> bool { self.0.base().is_cancelled() }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::{TestSubscriber, TestSubscription};

  /// Forwards items unchanged, fails on negative ones.
  struct Passthrough {
    base: OperationBase<i32>,
  }

  impl Operation for Passthrough {
    type Input = i32;
    type Output = i32;

    fn base(&self) -> &OperationBase<i32> { &self.base }

    fn consume0(&self, item: i32) -> Result<(), FlowError> {
      if item < 0 {
        return Err(FlowError::msg("negative"));
      }
      self.base.emit(item);
      Ok(())
    }
  }

  fn passthrough(downstream: &Arc<TestSubscriber<i32>>) -> OperationHandle<Passthrough> {
    let downstream: SubscriberRef<i32> = downstream.clone();
    OperationHandle::new(Passthrough { base: OperationBase::new(downstream) })
  }

  #[flowable_macro::test]
  fn forwards_demand_and_items() {
    let downstream = TestSubscriber::new(2);
    let upstream = TestSubscription::new();
    let handle = passthrough(&downstream);
    handle.on_subscribe(upstream.clone());
    assert_eq!(upstream.requested(), 2);
    handle.consume(1);
    handle.consume(2);
    handle.complete();
    assert_eq!(downstream.items(), vec![1, 2]);
    assert!(downstream.is_completed());
  }

  #[flowable_macro::test]
  fn consume_error_cancels_upstream_and_fails_once() {
    let downstream = TestSubscriber::new(5);
    let upstream = TestSubscription::new();
    let handle = passthrough(&downstream);
    handle.on_subscribe(upstream.clone());
    handle.consume(1);
    handle.consume(-1);
    handle.consume(2);
    handle.complete();
    handle.fail(FlowError::msg("late"));
    assert!(upstream.is_cancelled());
    assert_eq!(downstream.items(), vec![1]);
    assert_eq!(downstream.terminal_count(), 1);
    assert_eq!(downstream.failure().map(|e| e.to_string()), Some("negative".into()));
  }

  #[flowable_macro::test]
  fn cancel_is_idempotent_and_silences_downstream() {
    let downstream = TestSubscriber::new(5);
    let upstream = TestSubscription::new();
    let handle = passthrough(&downstream);
    handle.on_subscribe(upstream.clone());
    handle.cancel();
    handle.cancel();
    handle.consume(1);
    handle.complete();
    handle.request(3);
    assert!(upstream.is_cancelled());
    assert_eq!(upstream.requested(), 5);
    assert!(downstream.items().is_empty());
    assert_eq!(downstream.terminal_count(), 0);
  }

  #[flowable_macro::test]
  fn zero_request_fails_the_chain() {
    let downstream = TestSubscriber::new(0);
    let upstream = TestSubscription::new();
    let handle = passthrough(&downstream);
    handle.on_subscribe(upstream.clone());
    handle.request(0);
    assert!(upstream.is_cancelled());
    assert!(matches!(downstream.failure(), Some(FlowError::InvalidDemand(0))));
  }

  #[flowable_macro::test]
  fn duplicate_on_subscribe_cancels_the_newcomer() {
    let downstream = TestSubscriber::new(1);
    let first = TestSubscription::new();
    let second = TestSubscription::new();
    let handle = passthrough(&downstream);
    handle.on_subscribe(first.clone());
    handle.on_subscribe(second.clone());
    assert!(!first.is_cancelled());
    assert!(second.is_cancelled());
    assert_eq!(downstream.subscribe_count(), 1);
  }
}
