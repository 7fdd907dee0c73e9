//! SubscribeOn operator implementation
//!
//! `SubscribeOn` moves the act of subscribing onto a [`Scheduler`]. For the
//! source factories that also moves the production loop: items are produced
//! on whichever thread issues the demand, starting with the scheduler's.

use std::sync::Arc;

use tracing::warn;

use crate::{
  publisher::Publisher,
  scheduler::Scheduler,
  subscriber::SubscriberRef,
  subscription::EmptySubscription,
};

/// The `SubscribeOn` operator.
///
/// This struct is created by the `subscribe_on` method on
/// [`PublisherExt`](crate::publisher::PublisherExt).
pub struct SubscribeOn<S, Sch> {
  source: Arc<S>,
  scheduler: Sch,
}

impl<S, Sch: Clone> Clone for SubscribeOn<S, Sch> {
  fn clone(&self) -> Self { SubscribeOn { source: self.source.clone(), scheduler: self.scheduler.clone() } }
}

impl<S, Sch> SubscribeOn<S, Sch> {
  pub fn new(source: S, scheduler: Sch) -> Self { SubscribeOn { source: Arc::new(source), scheduler } }
}

impl<S, Sch> Publisher for SubscribeOn<S, Sch>
where
  S: Publisher + 'static,
  Sch: Scheduler,
{
  type Item = S::Item;

  fn subscribe(&self, subscriber: SubscriberRef<S::Item>) {
    let source = self.source.clone();
    let scheduled = subscriber.clone();
    if let Err(cause) = self.scheduler.schedule(Box::new(move || source.subscribe(scheduled))) {
      warn!(error = %cause, "subscription could not be scheduled");
      subscriber.on_subscribe(EmptySubscription::shared());
      subscriber.fail(cause);
    }
  }
}
