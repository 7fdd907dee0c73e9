//! Prelude module for convenient imports
//!
//! This module re-exports commonly used types and traits for easy access.

pub use crate::{
  counter::UNBOUNDED,
  emitter::{Emitter, EmitterListener},
  error::FlowError,
  publisher::{BoxPublisher, Publisher, PublisherExt},
  scheduler::{ImmediateScheduler, NewThreadScheduler, Scheduler},
  subscriber::{Subscriber, SubscriberRef},
  subscription::{Subscription, SubscriptionRef},
};
#[cfg(feature = "futures-scheduler")]
pub use crate::scheduler::DefaultScheduler;
