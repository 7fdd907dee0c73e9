//! IntoStream Operator
//!
//! Converts a [`Publisher`] into a [`futures::Stream`], so a flow can be
//! consumed with `while let` loops in async code.
//!
//! The stream keeps a bounded window of demand open: `prefetch` items are
//! requested up front and each item taken from the stream requests one more.
//! Dropping the stream cancels the subscription.
//!
//! # Example
//!
//! ```rust
//! use futures::StreamExt;
//! use flowable::prelude::*;
//!
//! # futures::executor::block_on(async {
//! let mut stream = flowable::from_iter(1..=3).into_stream(2);
//!
//! while let Some(Ok(value)) = stream.next().await {
//!   println!("Received: {}", value);
//! }
//! # });
//! ```

use std::{
  collections::VecDeque,
  pin::Pin,
  sync::{Arc, Mutex, MutexGuard, PoisonError},
  task::{Context, Poll, Waker},
};

use futures::Stream;
use once_cell::sync::OnceCell;

use crate::{
  error::FlowError,
  publisher::Publisher,
  subscriber::Subscriber,
  subscription::SubscriptionRef,
};

/// Buffer shared between the subscriber side and the polling side.
struct IntoStreamState<T> {
  /// Items and the failure waiting to be polled.
  queue: VecDeque<Result<T, FlowError>>,
  /// The task waiting on the stream.
  waker: Option<Waker>,
  /// The upstream terminated or the stream was dropped.
  is_closed: bool,
}

struct Shared<T> {
  state: Mutex<IntoStreamState<T>>,
  subscription: OnceCell<SubscriptionRef>,
}

impl<T> Shared<T> {
  fn state(&self) -> MutexGuard<'_, IntoStreamState<T>> { self.state.lock().unwrap_or_else(PoisonError::into_inner) }

  fn push(&self, item: Option<Result<T, FlowError>>) {
    let waker = {
      let mut state = self.state();
      match item {
        Some(item @ Ok(_)) => state.queue.push_back(item),
        Some(failure) => {
          state.queue.push_back(failure);
          state.is_closed = true;
        }
        None => state.is_closed = true,
      }
      state.waker.take()
    };
    if let Some(waker) = waker {
      waker.wake();
    }
  }
}

/// A `Stream` yielding the items of a [`Publisher`].
///
/// This struct is created by the
/// [`into_stream`](crate::publisher::PublisherExt::into_stream) method.
///
/// - `Ok(T)`: each item of the flow.
/// - `Err(FlowError)`: the failure, after which the stream ends.
/// - `None`: the flow completed, or failed and the failure was yielded.
pub struct IntoStream<T> {
  shared: Arc<Shared<T>>,
}

impl<T: Send + 'static> IntoStream<T> {
  /// Subscribes to `publisher`. A `prefetch` of zero is treated as one.
  pub fn new<P>(publisher: &P, prefetch: u64) -> Self
  where
    P: Publisher<Item = T> + ?Sized,
  {
    let shared = Arc::new(Shared {
      state: Mutex::new(IntoStreamState { queue: VecDeque::new(), waker: None, is_closed: false }),
      subscription: OnceCell::new(),
    });
    publisher.subscribe(Arc::new(IntoStreamSubscriber { shared: shared.clone(), prefetch: prefetch.max(1) }));
    IntoStream { shared }
  }
}

impl<T> Stream for IntoStream<T> {
  type Item = Result<T, FlowError>;

  fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    let shared = &self.get_mut().shared;
    let polled = {
      let mut state = shared.state();
      match state.queue.pop_front() {
        Some(item) => Some(item),
        None if state.is_closed => return Poll::Ready(None),
        None => {
          state.waker = Some(cx.waker().clone());
          None
        }
      }
    };
    match polled {
      Some(item) => {
        if item.is_ok() {
          if let Some(subscription) = shared.subscription.get() {
            subscription.request(1);
          }
        }
        Poll::Ready(Some(item))
      }
      None => Poll::Pending,
    }
  }
}

impl<T> Drop for IntoStream<T> {
  fn drop(&mut self) {
    self.shared.state().is_closed = true;
    if let Some(subscription) = self.shared.subscription.get() {
      subscription.cancel();
    }
  }
}

/// Subscriber feeding an [`IntoStream`].
struct IntoStreamSubscriber<T> {
  shared: Arc<Shared<T>>,
  prefetch: u64,
}

impl<T: Send> Subscriber<T> for IntoStreamSubscriber<T> {
  fn on_subscribe(&self, subscription: SubscriptionRef) {
    if let Err(duplicate) = self.shared.subscription.set(subscription.clone()) {
      duplicate.cancel();
      return;
    }
    if self.shared.state().is_closed {
      subscription.cancel();
    } else {
      subscription.request(self.prefetch);
    }
  }

  fn consume(&self, item: T) { self.shared.push(Some(Ok(item))); }

  fn complete(&self) { self.shared.push(None); }

  fn fail(&self, cause: FlowError) { self.shared.push(Some(Err(cause))); }
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use futures::{executor::block_on, StreamExt};

  use crate::prelude::*;

  #[flowable_macro::test]
  fn yields_every_item() {
    let stream = flowable::from_iter(1..=5).into_stream(2);
    let items: Vec<_> = block_on(stream.map(|item| item.unwrap()).collect());
    assert_eq!(items, vec![1, 2, 3, 4, 5]);
  }

  #[flowable_macro::test]
  fn yields_failure_then_ends() {
    let source = flowable::create(|emitter: Emitter<i32>| {
      emitter.emit(1);
      emitter.fail("boom");
    });
    let mut stream = source.into_stream(8);
    block_on(async {
      assert_eq!(stream.next().await.map(|r| r.ok()), Some(Some(1)));
      assert!(matches!(stream.next().await, Some(Err(_))));
      assert!(stream.next().await.is_none());
    });
  }

  #[flowable_macro::test(shared)]
  async fn consumes_across_threads() {
    let stream = flowable::from_iter(0..100).subscribe_on(flowable::scheduler::new_thread()).into_stream(4);
    let total: i32 = stream.map(|item| item.unwrap()).fold(0, |acc, v| async move { acc + v }).await;
    assert_eq!(total, 4950);
  }

  #[flowable_macro::test]
  fn drop_cancels_the_subscription() {
    let captured = Arc::new(Mutex::new(None));
    let c_captured = captured.clone();
    let source = flowable::create(move |emitter: Emitter<i32>| {
      *c_captured.lock().unwrap() = Some(emitter);
    });
    let stream = source.into_stream(1);
    let emitter = captured.lock().unwrap().take().unwrap();
    assert!(!emitter.is_cancelled());
    drop(stream);
    assert!(emitter.is_cancelled());
  }
}
