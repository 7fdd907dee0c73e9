//! # flowable: demand-driven reactive streams
//!
//! Composable primitives for producing, transforming and consuming
//! asynchronous sequences under consumer-driven flow control. A subscriber
//! receives no more items than it asked for with `request(n)`, `cancel()` is
//! safe from any thread, and nested streams are flattened in order without
//! interleaving.
//!
//! ## Quick Start
//!
//! ```rust
//! use flowable::prelude::*;
//!
//! let total = flowable::from_iter(0..10)
//!   .filter(|v| v % 2 == 0)
//!   .map(|v| v * 2)
//!   .reduce(|a, b| a + b)
//!   .block_all()
//!   .unwrap();
//!
//! assert_eq!(total, vec![40]);
//! ```
//!
//! ## Key Concepts
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Publisher`] | Cold stream template, one independent run per subscription |
//! | [`Subscriber`] | Receives `on_subscribe`, `consume`, then `complete` or `fail` |
//! | [`Subscription`] | Per-subscription `request(n)` / `cancel()` handle |
//! | [`Operation`] | Adapter between one upstream and one downstream |
//! | [`Scheduler`] | Where `subscribe_on` runs a subscription |
//!
//! ## Feature Flags
//!
//! - **`futures-scheduler`** (default): `futures` thread pool schedulers
//! - **`tokio-scheduler`**: run subscriptions on a tokio runtime handle
//!
//! [`Publisher`]: publisher::Publisher
//! [`Subscriber`]: subscriber::Subscriber
//! [`Subscription`]: subscription::Subscription
//! [`Operation`]: operation::Operation
//! [`Scheduler`]: scheduler::Scheduler

extern crate self as flowable;

pub mod counter;
pub mod emitter;
pub mod error;
pub mod factory;
pub mod operation;
pub mod ops;
pub mod prelude;
pub mod publisher;
mod pump;
pub mod scheduler;
pub mod subscriber;
pub mod subscription;
pub mod testing;
pub mod worker;

pub use counter::UNBOUNDED;
pub use factory::*;
pub use prelude::*;
