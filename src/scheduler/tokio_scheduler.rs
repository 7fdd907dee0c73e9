use tokio::runtime::Handle;

use crate::{
  error::FlowError,
  scheduler::{Scheduler, Task},
};

/// Runs tasks on the runtime's blocking pool: a subscription may drive a
/// synchronous production loop for as long as its subscriber keeps asking.
impl Scheduler for Handle {
  fn schedule(&self, task: Task) -> Result<(), FlowError> {
    drop(self.spawn_blocking(task));
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use super::*;
  use crate::{prelude::*, testing::TestSubscriber};

  #[flowable_macro::test(shared)]
  async fn subscribe_on_tokio_handle() {
    let subscriber = TestSubscriber::unbounded();
    flowable::from_iter(1..=3).subscribe_on(Handle::current()).subscribe(subscriber.clone());
    let waiter = subscriber.clone();
    let done = tokio::task::spawn_blocking(move || waiter.await_terminal(Duration::from_secs(5))).await.unwrap();
    assert!(done);
    assert_eq!(subscriber.items(), vec![1, 2, 3]);
  }
}
