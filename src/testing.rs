//! Probes for exercising publishers and operations in tests.
//!
//! [`TestSubscriber`] records every signal it receives and lets the test drive
//! demand explicitly. [`TestSubscription`] stands in for an upstream and
//! records the demand and cancellation it sees.

use std::{
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Condvar, Mutex, MutexGuard, PoisonError,
  },
  time::Duration,
};

use crate::{
  counter::Counter,
  error::FlowError,
  subscriber::Subscriber,
  subscription::{Subscription, SubscriptionRef},
};

/// One observed signal.
#[derive(Debug, Clone)]
pub enum Signal<T> {
  Subscribed,
  Item(T),
  Completed,
  Failed(FlowError),
}

impl<T> Signal<T> {
  pub fn is_terminal(&self) -> bool { matches!(self, Signal::Completed | Signal::Failed(_)) }
}

/// Subscriber that records signals and requests on command.
pub struct TestSubscriber<T> {
  initial_request: u64,
  subscription: Mutex<Option<SubscriptionRef>>,
  signals: Mutex<Vec<Signal<T>>>,
  terminated: Condvar,
}

impl<T> TestSubscriber<T> {
  /// A subscriber that requests `initial_request` items in `on_subscribe`
  /// (nothing when zero).
  pub fn new(initial_request: u64) -> Arc<Self> {
    Arc::new(TestSubscriber {
      initial_request,
      subscription: Mutex::new(None),
      signals: Mutex::new(Vec::new()),
      terminated: Condvar::new(),
    })
  }

  /// A subscriber that disables backpressure right away.
  pub fn unbounded() -> Arc<Self> { Self::new(crate::counter::UNBOUNDED) }

  pub fn request(&self, count: u64) {
    if let Some(subscription) = self.subscription() {
      subscription.request(count);
    }
  }

  pub fn cancel(&self) {
    if let Some(subscription) = self.subscription() {
      subscription.cancel();
    }
  }

  pub fn subscription(&self) -> Option<SubscriptionRef> {
    self.subscription.lock().unwrap_or_else(PoisonError::into_inner).clone()
  }

  pub fn subscribe_count(&self) -> usize {
    self.signals().iter().filter(|s| matches!(s, Signal::Subscribed)).count()
  }

  pub fn item_count(&self) -> usize { self.signals().iter().filter(|s| matches!(s, Signal::Item(_))).count() }

  pub fn terminal_count(&self) -> usize { self.signals().iter().filter(|s| s.is_terminal()).count() }

  pub fn is_completed(&self) -> bool { self.signals().iter().any(|s| matches!(s, Signal::Completed)) }

  pub fn failure(&self) -> Option<FlowError> {
    self.signals().iter().find_map(|s| match s {
      Signal::Failed(cause) => Some(cause.clone()),
      _ => None,
    })
  }

  /// Number of signals recorded after the first terminal one; anything but
  /// zero is a contract violation.
  pub fn signals_after_terminal(&self) -> usize {
    let signals = self.signals();
    signals
      .iter()
      .position(Signal::is_terminal)
      .map_or(0, |at| signals.len() - at - 1)
  }

  /// Blocks until a terminal signal arrives. Returns `false` on timeout.
  pub fn await_terminal(&self, timeout: Duration) -> bool {
    let signals = self.signals();
    let (signals, _) = self
      .terminated
      .wait_timeout_while(signals, timeout, |s| !s.iter().any(Signal::is_terminal))
      .unwrap_or_else(PoisonError::into_inner);
    signals.iter().any(Signal::is_terminal)
  }

  fn signals(&self) -> MutexGuard<'_, Vec<Signal<T>>> {
    self.signals.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn record(&self, signal: Signal<T>) {
    let terminal = signal.is_terminal();
    self.signals().push(signal);
    if terminal {
      self.terminated.notify_all();
    }
  }
}

impl<T: Clone> TestSubscriber<T> {
  pub fn items(&self) -> Vec<T> {
    self
      .signals()
      .iter()
      .filter_map(|s| match s {
        Signal::Item(item) => Some(item.clone()),
        _ => None,
      })
      .collect()
  }

  pub fn recorded(&self) -> Vec<Signal<T>> { self.signals().clone() }
}

impl<T: Send> Subscriber<T> for TestSubscriber<T> {
  fn on_subscribe(&self, subscription: SubscriptionRef) {
    {
      let mut slot = self.subscription.lock().unwrap_or_else(PoisonError::into_inner);
      if slot.is_some() {
        drop(slot);
        subscription.cancel();
        return;
      }
      *slot = Some(subscription.clone());
    }
    self.record(Signal::Subscribed);
    if self.initial_request > 0 {
      subscription.request(self.initial_request);
    }
  }

  fn consume(&self, item: T) { self.record(Signal::Item(item)); }

  fn complete(&self) { self.record(Signal::Completed); }

  fn fail(&self, cause: FlowError) { self.record(Signal::Failed(cause)); }
}

/// Upstream stand-in recording requested demand and cancellation.
#[derive(Default)]
pub struct TestSubscription {
  requested: Counter,
  requests: Mutex<Vec<u64>>,
  cancelled: AtomicBool,
}

impl TestSubscription {
  pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

  /// Total demand requested so far.
  pub fn requested(&self) -> u64 { self.requested.value() }

  /// Each individual `request` call, in order.
  pub fn requests(&self) -> Vec<u64> { self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone() }
}

impl Subscription for TestSubscription {
  fn request(&self, count: u64) {
    self.requested.increase(count);
    self.requests.lock().unwrap_or_else(PoisonError::into_inner).push(count);
  }

  fn cancel(&self) { self.cancelled.store(true, Ordering::Release); }

  fn is_cancelled(&self) -> bool { self.cancelled.load(Ordering::Acquire) }
}
