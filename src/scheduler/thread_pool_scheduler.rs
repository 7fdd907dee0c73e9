use futures::{
  executor::{ThreadPool, ThreadPoolBuilder},
  future,
  task::SpawnExt,
};
use once_cell::sync::Lazy;
use tracing::warn;

use crate::{
  error::FlowError,
  scheduler::{Scheduler, Task},
};

static DEFAULT_POOL: Lazy<Result<ThreadPool, String>> = Lazy::new(|| {
  ThreadPoolBuilder::new().name_prefix("flowable-").create().map_err(|err| err.to_string())
});

impl Scheduler for ThreadPool {
  fn schedule(&self, task: Task) -> Result<(), FlowError> {
    self.spawn(future::lazy(move |_| task())).map_err(|err| {
      warn!(error = %err, "thread pool rejected task");
      FlowError::Rejected(err.to_string())
    })
  }
}

/// The process-wide thread pool, built on first use.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultScheduler;

impl Scheduler for DefaultScheduler {
  fn schedule(&self, task: Task) -> Result<(), FlowError> {
    match &*DEFAULT_POOL {
      Ok(pool) => pool.schedule(task),
      Err(reason) => Err(FlowError::Rejected(reason.clone())),
    }
  }
}
