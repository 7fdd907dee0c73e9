//! Blocking collection of a whole flow.

use std::sync::{Arc, Mutex, PoisonError};

use futures::{channel::oneshot, executor::block_on};
use tracing::warn;

use crate::{
  counter::UNBOUNDED,
  error::{FlowError, Result},
  publisher::Publisher,
  subscriber::Subscriber,
  subscription::SubscriptionRef,
};

struct CollectAll<T> {
  items: Mutex<Vec<T>>,
  done: Mutex<Option<oneshot::Sender<Result<Vec<T>>>>>,
}

impl<T> CollectAll<T> {
  fn finish(&self, outcome: Option<FlowError>) {
    let Some(done) = self.done.lock().unwrap_or_else(PoisonError::into_inner).take() else { return };
    let items = std::mem::take(&mut *self.items.lock().unwrap_or_else(PoisonError::into_inner));
    let _ = done.send(match outcome {
      None => Ok(items),
      Some(cause) => Err(cause),
    });
  }
}

impl<T: Send> Subscriber<T> for CollectAll<T> {
  fn on_subscribe(&self, subscription: SubscriptionRef) { subscription.request(UNBOUNDED); }

  fn consume(&self, item: T) { self.items.lock().unwrap_or_else(PoisonError::into_inner).push(item); }

  fn complete(&self) { self.finish(None); }

  fn fail(&self, cause: FlowError) { self.finish(Some(cause)); }
}

/// Subscribes with unbounded demand and parks the calling thread until the
/// flow terminates.
///
/// If every reference to the subscriber is dropped without a terminal signal
/// the call fails instead of blocking forever.
pub fn block_all<P>(publisher: &P) -> Result<Vec<P::Item>>
where
  P: Publisher + ?Sized,
{
  let (sender, receiver) = oneshot::channel();
  publisher.subscribe(Arc::new(CollectAll { items: Mutex::new(Vec::new()), done: Mutex::new(Some(sender)) }));
  block_on(receiver).unwrap_or_else(|_| {
    warn!("flow dropped its subscriber without a terminal signal");
    Err(FlowError::Protocol("subscriber dropped before a terminal signal"))
  })
}
