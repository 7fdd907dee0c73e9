use std::thread;

use tracing::warn;

use crate::{
  error::FlowError,
  scheduler::{Scheduler, Task},
};

/// Spawns one OS thread per task.
#[derive(Debug, Clone, Default)]
pub struct NewThreadScheduler {
  name: Option<String>,
}

impl NewThreadScheduler {
  /// Names every spawned thread `name`.
  pub fn named(name: impl Into<String>) -> Self { NewThreadScheduler { name: Some(name.into()) } }
}

impl Scheduler for NewThreadScheduler {
  fn schedule(&self, task: Task) -> Result<(), FlowError> {
    let mut builder = thread::Builder::new();
    if let Some(name) = &self.name {
      builder = builder.name(name.clone());
    }
    builder.spawn(task).map(drop).map_err(|err| {
      warn!(error = %err, "failed to spawn scheduler thread");
      FlowError::Rejected(err.to_string())
    })
  }
}

#[cfg(test)]
mod tests {
  use std::sync::mpsc::channel;

  use super::*;

  #[flowable_macro::test]
  fn runs_on_a_named_thread() {
    let (sender, receiver) = channel();
    NewThreadScheduler::named("flowable-test")
      .schedule(Box::new(move || {
        let _ = sender.send(thread::current().name().map(str::to_owned));
      }))
      .unwrap();
    assert_eq!(receiver.recv().unwrap().as_deref(), Some("flowable-test"));
  }
}
