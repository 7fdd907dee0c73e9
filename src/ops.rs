//! Operators and terminal adapters.
//!
//! Each operator wraps an upstream publisher and is itself a publisher; at
//! subscribe time it installs an [`Operation`](crate::operation::Operation)
//! between the upstream subscription and the downstream subscriber. The
//! user-supplied logic is held behind a strategy trait so the infallible and
//! the `try_` flavours of an operator share one implementation.

pub mod block;
pub mod filter;
pub mod flat_map;
pub mod into_stream;
pub mod map;
pub mod reduce;
pub mod subscribe_on;

pub use filter::Filter;
pub use flat_map::FlatMap;
pub use into_stream::IntoStream;
pub use map::Map;
pub use reduce::Reduce;
pub use subscribe_on::SubscribeOn;
