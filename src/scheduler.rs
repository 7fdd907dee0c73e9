//! Task execution capability used by `subscribe_on`.
//!
//! The engine never owns threads itself: a [`Scheduler`] is handed a task and
//! decides where it runs. Backends are selected with Cargo features:
//!
//! - `futures-scheduler` (default): [`futures::executor::ThreadPool`] and the
//!   lazily built process-wide [`DefaultScheduler`].
//! - `tokio-scheduler`: [`tokio::runtime::Handle`].
//!
//! [`NewThreadScheduler`] and [`ImmediateScheduler`] are always available.

use std::sync::Arc;

use crate::error::FlowError;

mod thread_scheduler;
pub use thread_scheduler::NewThreadScheduler;
#[cfg(feature = "futures-scheduler")]
mod thread_pool_scheduler;
#[cfg(feature = "futures-scheduler")]
pub use thread_pool_scheduler::DefaultScheduler;
#[cfg(feature = "tokio-scheduler")]
mod tokio_scheduler;

/// A unit of work handed to a [`Scheduler`].
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// An object that runs tasks, usually on some other thread.
pub trait Scheduler: Send + Sync {
  /// Runs `task` at the scheduler's discretion. An `Err` means the task was
  /// dropped without running.
  fn schedule(&self, task: Task) -> Result<(), FlowError>;
}

impl<S: Scheduler + ?Sized> Scheduler for Arc<S> {
  #[inline]
  fn schedule(&self, task: Task) -> Result<(), FlowError> { (**self).schedule(task) }
}

impl<S: Scheduler + ?Sized> Scheduler for &S {
  #[inline]
  fn schedule(&self, task: Task) -> Result<(), FlowError> { (**self).schedule(task) }
}

/// Runs every task inline, on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateScheduler;

impl Scheduler for ImmediateScheduler {
  fn schedule(&self, task: Task) -> Result<(), FlowError> {
    task();
    Ok(())
  }
}

/// Returns a scheduler that spawns a new thread for each unit of work.
pub fn new_thread() -> NewThreadScheduler { NewThreadScheduler::default() }
