//! Atomic counters used for demand accounting.
//!
//! [`Counter`] tracks items a subscriber asked for but has not received yet.
//! The value [`UNBOUNDED`] is sticky: once reached, the counter never goes
//! down again, which is how a `request(u64::MAX)` disables backpressure.
//!
//! [`WorkInProgress`] serializes drain loops: only the thread that moves it
//! away from zero emits, every other caller just records that it "missed" and
//! leaves the work to the active drainer.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Demand value that disables backpressure.
pub const UNBOUNDED: u64 = u64::MAX;

/// Thread-safe tally of outstanding demand.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
  /// Creates a counter at zero.
  pub const fn new() -> Self { Counter(AtomicU64::new(0)) }

  /// Creates a counter starting at `value`.
  pub const fn with_value(value: u64) -> Self { Counter(AtomicU64::new(value)) }

  /// Current outstanding demand.
  #[inline]
  pub fn value(&self) -> u64 { self.0.load(Ordering::Acquire) }

  #[inline]
  pub fn is_unbounded(&self) -> bool { self.value() == UNBOUNDED }

  /// Adds `count`, saturating at [`UNBOUNDED`]. Returns the new value.
  pub fn increase(&self, count: u64) -> u64 {
    let updated = self.0.fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
      Some(v.saturating_add(count))
    });
    match updated {
      Ok(prev) | Err(prev) => prev.saturating_add(count),
    }
  }

  /// Takes one unit of demand. Returns the new value.
  #[inline]
  pub fn decrease(&self) -> u64 { self.decrease_by(1) }

  /// Takes `count` units, stopping at zero. An unbounded counter is left
  /// untouched.
  pub fn decrease_by(&self, count: u64) -> u64 {
    match self.0.fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| match v {
      UNBOUNDED => None,
      v => Some(v.saturating_sub(count)),
    }) {
      Ok(prev) => prev.saturating_sub(count),
      Err(unbounded) => unbounded,
    }
  }

  /// Takes one unit only if some demand is outstanding.
  pub fn try_decrease(&self) -> bool {
    self
      .0
      .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| match v {
        0 => None,
        UNBOUNDED => Some(UNBOUNDED),
        v => Some(v - 1),
      })
      .is_ok()
  }

  /// Resets to zero and returns whatever was accumulated.
  pub fn take(&self) -> u64 { self.0.swap(0, Ordering::AcqRel) }
}

/// Drain-loop guard.
#[derive(Debug, Default)]
pub struct WorkInProgress(AtomicUsize);

impl WorkInProgress {
  pub const fn new() -> Self { WorkInProgress(AtomicUsize::new(0)) }

  /// Returns `true` if the caller became the drainer.
  #[inline]
  pub fn enter(&self) -> bool { self.0.fetch_add(1, Ordering::AcqRel) == 0 }

  /// Acknowledges `missed` passes. A non-zero return means more work arrived
  /// meanwhile and the drainer must loop again.
  #[inline]
  pub fn leave(&self, missed: usize) -> usize { self.0.fetch_sub(missed, Ordering::AcqRel) - missed }
}

#[cfg(test)]
mod tests {
  use std::{sync::Arc, thread};

  use super::*;

  #[flowable_macro::test]
  fn increase_and_decrease() {
    let counter = Counter::new();
    assert_eq!(counter.increase(3), 3);
    assert_eq!(counter.decrease(), 2);
    assert_eq!(counter.decrease_by(5), 0);
    assert_eq!(counter.value(), 0);
    assert!(!counter.try_decrease());
  }

  #[flowable_macro::test]
  fn unbounded_is_sticky() {
    let counter = Counter::with_value(10);
    assert_eq!(counter.increase(UNBOUNDED), UNBOUNDED);
    assert_eq!(counter.decrease(), UNBOUNDED);
    assert!(counter.try_decrease());
    assert!(counter.is_unbounded());
    assert_eq!(counter.increase(1), UNBOUNDED);
  }

  #[flowable_macro::test]
  fn take_resets() {
    let counter = Counter::with_value(7);
    assert_eq!(counter.take(), 7);
    assert_eq!(counter.value(), 0);
  }

  #[flowable_macro::test]
  fn concurrent_updates_balance_out() {
    let counter = Arc::new(Counter::new());
    let handles: Vec<_> = (0..8)
      .map(|_| {
        let counter = counter.clone();
        thread::spawn(move || {
          for _ in 0..1000 {
            counter.increase(2);
            counter.decrease();
          }
        })
      })
      .collect();
    handles.into_iter().for_each(|h| h.join().unwrap());
    assert_eq!(counter.value(), 8000);
  }

  #[flowable_macro::test]
  fn work_in_progress_reports_missed_passes() {
    let wip = WorkInProgress::new();
    assert!(wip.enter());
    assert!(!wip.enter());
    assert_eq!(wip.leave(1), 1);
    assert_eq!(wip.leave(1), 0);
    assert!(wip.enter());
  }
}
