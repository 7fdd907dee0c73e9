//! Publishers driven by an imperative producer.
//!
//! [`create`] hands every subscription a fresh [`Emitter`]. The producer may
//! push items faster than the subscriber asks for them: the surplus is
//! buffered and delivered as demand arrives, and `complete` / `fail` take
//! effect only once the buffer has drained.
//!
//! ```rust
//! use flowable::prelude::*;
//!
//! let words = flowable::create(|emitter: Emitter<&str>| {
//!   emitter.emit("hello");
//!   emitter.emit("world");
//!   emitter.complete();
//! });
//!
//! assert_eq!(words.block_all().unwrap(), vec!["hello", "world"]);
//! ```

use std::{
  collections::VecDeque,
  marker::PhantomData,
  sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use smallvec::SmallVec;
use tracing::trace;

use crate::{
  error::FlowError,
  publisher::Publisher,
  pump::{Pump, Source},
  subscriber::SubscriberRef,
  subscription::Subscription,
};

/// Observer of what a producer signals through its [`Emitter`].
///
/// Listeners see every item at the moment it is emitted, before it is
/// delivered (or buffered), and the terminal call as soon as the producer
/// makes it.
pub trait EmitterListener<T>: Send + Sync {
  fn on_emitted(&self, _item: &T) {}

  fn on_completed(&self) {}

  fn on_failed(&self, _cause: &FlowError) {}
}

type Listeners<T> = SmallVec<[Arc<dyn EmitterListener<T>>; 2]>;

struct EmitterState<T> {
  queue: VecDeque<T>,
  terminal: Option<Result<(), FlowError>>,
  listeners: Listeners<T>,
  /// Set by a terminal call or by cancellation; later signals are dropped.
  closed: bool,
}

pub(crate) struct EmitterSource<T> {
  state: Mutex<EmitterState<T>>,
}

impl<T> EmitterSource<T> {
  fn new() -> Self {
    EmitterSource {
      state: Mutex::new(EmitterState {
        queue: VecDeque::new(),
        terminal: None,
        listeners: SmallVec::new(),
        closed: false,
      }),
    }
  }

  fn state(&self) -> MutexGuard<'_, EmitterState<T>> { self.state.lock().unwrap_or_else(PoisonError::into_inner) }

  /// Closes the source with `outcome` and returns the listeners to notify,
  /// or `None` if it was already closed.
  fn close(&self, outcome: Result<(), FlowError>) -> Option<Listeners<T>> {
    let mut state = self.state();
    if state.closed {
      return None;
    }
    state.closed = true;
    state.terminal = Some(outcome);
    Some(std::mem::take(&mut state.listeners))
  }
}

impl<T: Send + 'static> Source for EmitterSource<T> {
  type Item = T;

  fn next_item(&self) -> Option<T> { self.state().queue.pop_front() }

  fn finished(&self) -> Option<Result<(), FlowError>> {
    let state = self.state();
    if state.queue.is_empty() {
      state.terminal.clone()
    } else {
      None
    }
  }

  fn cancelled(&self) {
    let mut state = self.state();
    state.closed = true;
    state.queue.clear();
    state.listeners.clear();
  }
}

// ============================================================================
// Emitter
// ============================================================================

/// Producer side of one [`create`] subscription.
pub struct Emitter<T: Send + 'static> {
  pump: Arc<Pump<EmitterSource<T>>>,
}

impl<T: Send + 'static> Clone for Emitter<T> {
  fn clone(&self) -> Self { Emitter { pump: self.pump.clone() } }
}

impl<T: Send + 'static> Emitter<T> {
  /// Pushes the next item. Ignored after `complete`, `fail` or cancellation.
  pub fn emit(&self, item: T) {
    let source = self.pump.source();
    let listeners = {
      let state = source.state();
      if state.closed {
        trace!("emit after terminal or cancel ignored");
        return;
      }
      state.listeners.clone()
    };
    for listener in &listeners {
      listener.on_emitted(&item);
    }
    {
      let mut state = source.state();
      if state.closed {
        return;
      }
      state.queue.push_back(item);
    }
    self.pump.drain();
  }

  /// Finishes the stream once every buffered item has been delivered.
  pub fn complete(&self) {
    if let Some(listeners) = self.pump.source().close(Ok(())) {
      for listener in &listeners {
        listener.on_completed();
      }
      self.pump.drain();
    }
  }

  /// Fails the stream once every buffered item has been delivered.
  pub fn fail(&self, cause: impl Into<FlowError>) {
    let cause = cause.into();
    if let Some(listeners) = self.pump.source().close(Err(cause.clone())) {
      for listener in &listeners {
        listener.on_failed(&cause);
      }
      self.pump.drain();
    }
  }

  /// Registers `listener`. Has no effect once the emitter is closed.
  pub fn observe<L>(&self, listener: L)
  where
    L: EmitterListener<T> + 'static,
  {
    let mut state = self.pump.source().state();
    if !state.closed {
      state.listeners.push(Arc::new(listener));
    }
  }

  /// Whether the subscriber cancelled. A producer should stop once this
  /// turns true.
  pub fn is_cancelled(&self) -> bool { self.pump.is_cancelled() }

  /// Outstanding demand not yet satisfied by delivered items.
  pub fn requested(&self) -> u64 { self.pump.requested() }
}

// ============================================================================
// create
// ============================================================================

/// Publisher created from a producer function.
///
/// This struct is created by [`create`].
pub struct Create<F, T> {
  producer: F,
  _marker: PhantomData<fn() -> T>,
}

impl<F: Clone, T> Clone for Create<F, T> {
  fn clone(&self) -> Self { Create { producer: self.producer.clone(), _marker: PhantomData } }
}

/// Runs `producer` once per subscription, right after the subscriber received
/// its subscription.
pub fn create<T, F>(producer: F) -> Create<F, T>
where
  T: Send + 'static,
  F: Fn(Emitter<T>) + Send + Sync + 'static,
{
  Create { producer, _marker: PhantomData }
}

impl<F, T> Publisher for Create<F, T>
where
  T: Send + 'static,
  F: Fn(Emitter<T>) + Send + Sync + 'static,
{
  type Item = T;

  fn subscribe(&self, subscriber: SubscriberRef<T>) {
    let pump = Arc::new(Pump::new(EmitterSource::new(), subscriber));
    Pump::start(pump.clone());
    (self.producer)(Emitter { pump });
  }
}
