//! Demand-driven delivery loop shared by the source publishers.
//!
//! A [`Pump`] is the subscription handed out by `from_iter`, `create` and the
//! other factories. It pulls items from its [`Source`] only while the
//! subscriber has outstanding demand, and a [`WorkInProgress`] guard makes
//! sure exactly one thread runs the loop at a time: a `request` issued from
//! inside `consume` (or from another thread) only bumps the demand and lets
//! the running loop pick it up, so synchronous chains never recurse.

use std::sync::{
  atomic::{AtomicBool, Ordering},
  Arc, Mutex, PoisonError,
};

use tracing::warn;

use crate::{
  counter::{Counter, WorkInProgress},
  error::FlowError,
  subscriber::SubscriberRef,
  subscription::Subscription,
};

/// Item supplier behind a [`Pump`].
pub(crate) trait Source: Send + Sync + 'static {
  type Item: Send + 'static;

  /// Next available item, `None` if nothing is ready right now.
  fn next_item(&self) -> Option<Self::Item>;

  /// `Some` once no further item will ever be produced; carries the terminal
  /// outcome. Only consulted when `next_item` has nothing or demand is zero.
  fn finished(&self) -> Option<Result<(), FlowError>>;

  /// Called once when the subscription is cancelled.
  fn cancelled(&self) {}
}

pub(crate) struct Pump<S: Source> {
  source: S,
  subscriber: Mutex<Option<SubscriberRef<S::Item>>>,
  requested: Counter,
  wip: WorkInProgress,
  cancelled: AtomicBool,
  invalid_request: AtomicBool,
}

impl<S: Source> Pump<S> {
  pub(crate) fn new(source: S, subscriber: SubscriberRef<S::Item>) -> Self {
    Pump {
      source,
      subscriber: Mutex::new(Some(subscriber)),
      requested: Counter::new(),
      wip: WorkInProgress::new(),
      cancelled: AtomicBool::new(false),
      invalid_request: AtomicBool::new(false),
    }
  }

  /// Hands `pump` to its subscriber and delivers whatever can be delivered
  /// without demand (an immediately finished source).
  pub(crate) fn start(pump: Arc<Self>) {
    if let Some(subscriber) = pump.subscriber() {
      subscriber.on_subscribe(pump.clone());
    }
    pump.drain();
  }

  pub(crate) fn source(&self) -> &S { &self.source }

  pub(crate) fn requested(&self) -> u64 { self.requested.value() }

  /// Runs the delivery loop, or leaves a note for the thread already running
  /// it.
  pub(crate) fn drain(&self) {
    if !self.wip.enter() {
      return;
    }
    let mut missed = 1;
    loop {
      let Some(subscriber) = self.subscriber() else { return };

      if self.invalid_request.load(Ordering::Acquire) {
        if self.close() {
          self.source.cancelled();
          subscriber.fail(FlowError::InvalidDemand(0));
        }
        return;
      }

      while self.requested.value() > 0 {
        if self.is_cancelled() {
          return;
        }
        match self.source.next_item() {
          Some(item) => {
            self.requested.decrease();
            subscriber.consume(item);
          }
          None => break,
        }
      }

      if self.is_cancelled() {
        return;
      }
      if let Some(outcome) = self.source.finished() {
        if self.close() {
          match outcome {
            Ok(()) => subscriber.complete(),
            Err(cause) => subscriber.fail(cause),
          }
        }
        return;
      }

      missed = self.wip.leave(missed);
      if missed == 0 {
        break;
      }
    }
  }

  fn subscriber(&self) -> Option<SubscriberRef<S::Item>> {
    self.subscriber.lock().unwrap_or_else(PoisonError::into_inner).clone()
  }

  /// Drops the subscriber so the terminal signal is delivered at most once.
  fn close(&self) -> bool { self.subscriber.lock().unwrap_or_else(PoisonError::into_inner).take().is_some() }
}

impl<S: Source> Subscription for Pump<S> {
  fn request(&self, count: u64) {
    if self.is_cancelled() {
      return;
    }
    if count == 0 {
      warn!("request(0) on a source subscription");
      self.invalid_request.store(true, Ordering::Release);
    } else {
      self.requested.increase(count);
    }
    self.drain();
  }

  fn cancel(&self) {
    if !self.cancelled.swap(true, Ordering::AcqRel) {
      self.close();
      self.source.cancelled();
    }
  }

  fn is_cancelled(&self) -> bool { self.cancelled.load(Ordering::Acquire) }
}
