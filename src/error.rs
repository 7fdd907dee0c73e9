//! Error type shared by every stage of a flow.
//!
//! Operator logic errors, upstream production errors and protocol violations
//! all travel downstream as a single [`FlowError`] through
//! [`Subscriber::fail`](crate::subscriber::Subscriber::fail).

use std::{error::Error as StdError, sync::Arc};

/// Errors delivered through the `fail` signal of a subscription.
///
/// `FlowError` is cheap to clone: wrapped causes live behind an `Arc`, so the
/// same failure can be handed to emitter listeners and to the subscriber.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FlowError {
  /// A user-supplied error, raised by a producer or by operator logic.
  #[error("{0}")]
  Failed(#[source] Arc<dyn StdError + Send + Sync>),
  /// An ad-hoc failure described only by its message.
  #[error("{0}")]
  Message(String),
  /// An operation detected that one of its own invariants was broken.
  #[error("protocol violation: {0}")]
  Protocol(&'static str),
  /// A subscriber requested a non-positive number of items.
  #[error("request count must be positive, got {0}")]
  InvalidDemand(u64),
  /// A scheduler refused to run a task.
  #[error("scheduler rejected task: {0}")]
  Rejected(String),
}

impl FlowError {
  /// Wraps any error as [`FlowError::Failed`].
  pub fn from_error<E>(err: E) -> Self
  where
    E: StdError + Send + Sync + 'static,
  {
    FlowError::Failed(Arc::new(err))
  }

  /// Builds a [`FlowError::Message`].
  pub fn msg(message: impl Into<String>) -> Self { FlowError::Message(message.into()) }

  /// Returns `true` for failures caused by the engine itself rather than by
  /// user logic.
  pub fn is_protocol(&self) -> bool {
    matches!(self, FlowError::Protocol(_) | FlowError::InvalidDemand(_))
  }
}

impl From<&str> for FlowError {
  fn from(message: &str) -> Self { FlowError::msg(message) }
}

impl From<String> for FlowError {
  fn from(message: String) -> Self { FlowError::Message(message) }
}

impl From<std::io::Error> for FlowError {
  fn from(err: std::io::Error) -> Self { FlowError::from_error(err) }
}

/// Result alias used by fallible operator closures.
pub type Result<T, E = FlowError> = std::result::Result<T, E>;
