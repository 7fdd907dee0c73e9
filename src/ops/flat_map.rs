//! FlatMap operator implementation
//!
//! `FlatMap` maps each outer item to an inner publisher and drains that inner
//! publisher completely, through a [`Worker`], before the next outer item is
//! requested. Inner streams are therefore concatenated and never interleave.
//!
//! The operation moves through three stages, all guarded by one lock:
//!
//! - `Idle`: no inner stream. Downstream demand asks the outer upstream for
//!   one item (at most one such request is in flight).
//! - `Mapping`: an outer item is being mapped; demand only accumulates.
//! - `Draining`: a worker owns the inner stream; downstream demand is
//!   forwarded to it.
//!
//! Demand for a new worker is snapshotted under the same lock that publishes
//! the worker, so a concurrent `request` lands either in the snapshot or on the
//! new worker, never in both and never nowhere.

use std::sync::{
  atomic::{AtomicU64, Ordering},
  Arc, Mutex, MutexGuard, PoisonError, Weak,
};

use tracing::{trace, warn};

use crate::{
  counter::Counter,
  error::FlowError,
  operation::{Operation, OperationBase, OperationHandle},
  publisher::Publisher,
  subscriber::SubscriberRef,
  worker::{Worker, WorkerObserver},
};

/// Maps an outer item to the inner publisher to drain.
pub trait FlatMapStrategy<Item>: Send + Sync + 'static {
  type Inner: Publisher + 'static;

  fn apply(&self, item: Item) -> Result<Self::Inner, FlowError>;
}

/// Strategy for `flat_map`.
#[derive(Clone)]
pub struct FlatMapFn<F>(pub F);

impl<F, Item, P> FlatMapStrategy<Item> for FlatMapFn<F>
where
  F: Fn(Item) -> P + Send + Sync + 'static,
  P: Publisher + 'static,
{
  type Inner = P;

  #[inline]
  fn apply(&self, item: Item) -> Result<P, FlowError> { Ok((self.0)(item)) }
}

/// Strategy for `try_flat_map`.
#[derive(Clone)]
pub struct TryFlatMapFn<F>(pub F);

impl<F, Item, P> FlatMapStrategy<Item> for TryFlatMapFn<F>
where
  F: Fn(Item) -> Result<P, FlowError> + Send + Sync + 'static,
  P: Publisher + 'static,
{
  type Inner = P;

  #[inline]
  fn apply(&self, item: Item) -> Result<P, FlowError> { (self.0)(item) }
}

type InnerItem<T, M> = <<M as FlatMapStrategy<T>>::Inner as Publisher>::Item;

/// The `FlatMap` operator.
///
/// This struct is created by the `flat_map` and `try_flat_map` methods on
/// [`PublisherExt`](crate::publisher::PublisherExt).
pub struct FlatMap<S, M> {
  source: S,
  mapper: Arc<M>,
}

impl<S: Clone, M> Clone for FlatMap<S, M> {
  fn clone(&self) -> Self { FlatMap { source: self.source.clone(), mapper: self.mapper.clone() } }
}

impl<S, M> FlatMap<S, M> {
  pub fn new(source: S, mapper: M) -> Self { FlatMap { source, mapper: Arc::new(mapper) } }
}

impl<S, M> Publisher for FlatMap<S, M>
where
  S: Publisher,
  M: FlatMapStrategy<S::Item>,
{
  type Item = InnerItem<S::Item, M>;

  fn subscribe(&self, subscriber: SubscriberRef<Self::Item>) {
    let handle = OperationHandle::cyclic(|me: &Weak<FlatMapOperation<S::Item, M>>| FlatMapOperation {
      base: OperationBase::new(subscriber),
      mapper: self.mapper.clone(),
      state: Mutex::new(FlatMapState {
        stage: Stage::Idle,
        outer_completed: false,
        outer_requested: false,
      }),
      requested: Counter::new(),
      next_worker: AtomicU64::new(0),
      me: me.clone(),
    });
    self.source.subscribe(handle.into_subscriber());
  }
}

enum Stage<R> {
  Idle,
  Mapping,
  Draining(Arc<Worker<R>>),
}

struct FlatMapState<R> {
  stage: Stage<R>,
  outer_completed: bool,
  /// An outer `request(1)` is in flight.
  outer_requested: bool,
}

impl<R> FlatMapState<R> {
  fn active_worker(&self) -> Option<&Arc<Worker<R>>> {
    match &self.stage {
      Stage::Draining(worker) => Some(worker),
      _ => None,
    }
  }

  /// Returns to `Idle` if worker `id` is the active one.
  fn release_worker(&mut self, id: u64) -> bool {
    let current = self.active_worker().map_or(false, |worker| worker.id() == id);
    if current {
      self.stage = Stage::Idle;
    }
    current
  }
}

pub struct FlatMapOperation<T, M: FlatMapStrategy<T>> {
  base: OperationBase<InnerItem<T, M>>,
  mapper: Arc<M>,
  state: Mutex<FlatMapState<InnerItem<T, M>>>,
  requested: Counter,
  next_worker: AtomicU64,
  me: Weak<Self>,
}

impl<T, M> FlatMapOperation<T, M>
where
  T: 'static,
  M: FlatMapStrategy<T>,
{
  fn state(&self) -> MutexGuard<'_, FlatMapState<InnerItem<T, M>>> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Claims the single outer request slot if the operation can use another
  /// outer item. Must be called with the state lock held.
  fn claim_outer_request(&self, state: &mut FlatMapState<InnerItem<T, M>>) -> bool {
    let wanted = matches!(state.stage, Stage::Idle)
      && !state.outer_completed
      && !state.outer_requested
      && self.requested.value() > 0;
    if wanted {
      state.outer_requested = true;
    }
    wanted
  }

  fn start_worker(&self, inner: M::Inner) {
    let worker = {
      let mut state = self.state();
      if !self.base.is_active() {
        return;
      }
      let id = self.next_worker.fetch_add(1, Ordering::Relaxed);
      let owner: Weak<dyn WorkerObserver<InnerItem<T, M>>> = self.me.clone();
      let worker = Worker::new(id, owner);
      let demand = self.requested.value();
      if demand > 0 {
        worker.request(demand);
      }
      state.stage = Stage::Draining(worker.clone());
      worker
    };
    worker.run(&inner);
  }
}

impl<T, M> Operation for FlatMapOperation<T, M>
where
  T: 'static,
  M: FlatMapStrategy<T>,
{
  type Input = T;
  type Output = InnerItem<T, M>;

  fn base(&self) -> &OperationBase<Self::Output> { &self.base }

  fn consume0(&self, item: T) -> Result<(), FlowError> {
    {
      let mut state = self.state();
      state.outer_requested = false;
      if !matches!(state.stage, Stage::Idle) {
        warn!("outer item arrived while an inner stream is still active");
        return Err(FlowError::Protocol("flat_map received an outer item while draining an inner stream"));
      }
      state.stage = Stage::Mapping;
    }
    match self.mapper.apply(item) {
      Ok(inner) => {
        self.start_worker(inner);
        Ok(())
      }
      Err(cause) => {
        self.state().stage = Stage::Idle;
        Err(cause)
      }
    }
  }

  fn complete0(&self) {
    let idle = {
      let mut state = self.state();
      state.outer_completed = true;
      matches!(state.stage, Stage::Idle)
    };
    if idle {
      self.base.complete_downstream();
    } else {
      trace!("outer completed, waiting for the active inner stream");
    }
  }

  fn request0(&self, count: u64) {
    let mut state = self.state();
    self.requested.increase(count);
    if let Some(worker) = state.active_worker().cloned() {
      drop(state);
      worker.request(count);
    } else if self.claim_outer_request(&mut state) {
      drop(state);
      self.base.request_upstream(1);
    }
  }

  fn abort0(&self) {
    let stage = std::mem::replace(&mut self.state().stage, Stage::Idle);
    if let Stage::Draining(worker) = stage {
      worker.cancel();
    }
  }
}

impl<T, M> WorkerObserver<InnerItem<T, M>> for FlatMapOperation<T, M>
where
  T: 'static,
  M: FlatMapStrategy<T>,
{
  fn on_worker_consumed(&self, item: InnerItem<T, M>, _id: u64) {
    self.requested.decrease();
    self.base.emit(item);
  }

  fn on_worker_completed(&self, id: u64) {
    let mut state = self.state();
    if !state.release_worker(id) {
      return;
    }
    if state.outer_completed {
      drop(state);
      self.base.complete_downstream();
    } else if self.claim_outer_request(&mut state) {
      drop(state);
      self.base.request_upstream(1);
    }
  }

  fn on_worker_failed(&self, cause: FlowError, id: u64) {
    if self.state().release_worker(id) {
      self.base.fail_all(cause);
    }
  }
}
