//! Wall-clock source for cache timestamps and session heartbeats.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::Utc;

pub trait Clock: Send + Sync {
  /// Milliseconds since the Unix epoch.
  fn now_ms(&self) -> i64;
}

/// The real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now_ms(&self) -> i64 {
    Utc::now().timestamp_millis()
  }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
  now: AtomicI64,
}

impl ManualClock {
  pub fn new(start_ms: i64) -> Self {
    Self {
      now: AtomicI64::new(start_ms),
    }
  }

  pub fn advance(&self, by: Duration) {
    self.now.fetch_add(duration_ms(by), Ordering::SeqCst);
  }

  pub fn set(&self, now_ms: i64) {
    self.now.store(now_ms, Ordering::SeqCst);
  }
}

impl Clock for ManualClock {
  fn now_ms(&self) -> i64 {
    self.now.load(Ordering::SeqCst)
  }
}

/// Duration as signed milliseconds, saturating.
pub(crate) fn duration_ms(duration: Duration) -> i64 {
  i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
