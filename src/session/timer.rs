//! Debounced idle timer.
//!
//! A single pending countdown that every `reset()` replaces. Bursts of resets
//! collapse into one timer; the expiry callback fires only if the full
//! duration passes without another reset or a cancel.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

type ExpireFn = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct TimerState {
  pending: Option<JoinHandle<()>>,
  /// Bumped on every reset/cancel so a countdown that already woke up can
  /// tell it was superseded.
  generation: u64,
  on_expire: Option<ExpireFn>,
}

pub struct IdleTimer {
  duration: Duration,
  state: Arc<Mutex<TimerState>>,
}

impl IdleTimer {
  pub fn new(duration: Duration) -> Self {
    Self {
      duration,
      state: Arc::default(),
    }
  }

  pub fn duration(&self) -> Duration {
    self.duration
  }

  /// Set the callback run when a countdown completes. Replaces any previous one.
  pub fn on_expire(&self, f: impl Fn() + Send + Sync + 'static) {
    self.lock().on_expire = Some(Arc::new(f));
  }

  /// Restart the countdown from the full duration.
  pub fn reset(&self) {
    self.reset_after(self.duration);
  }

  /// Restart the countdown with a custom remaining time.
  ///
  /// Must be called from within a tokio runtime.
  pub fn reset_after(&self, after: Duration) {
    let mut state = self.lock();
    if let Some(pending) = state.pending.take() {
      pending.abort();
    }
    state.generation = state.generation.wrapping_add(1);

    let generation = state.generation;
    let shared = Arc::clone(&self.state);
    state.pending = Some(tokio::spawn(async move {
      tokio::time::sleep(after).await;

      let callback = {
        let mut state = shared.lock().unwrap_or_else(PoisonError::into_inner);
        if state.generation != generation {
          return;
        }
        state.pending = None;
        state.on_expire.clone()
      };

      // Outside the lock so the callback may reset or cancel this timer
      if let Some(callback) = callback {
        callback();
      }
    }));
  }

  /// Stop the countdown without firing.
  pub fn cancel(&self) {
    let mut state = self.lock();
    if let Some(pending) = state.pending.take() {
      pending.abort();
    }
    state.generation = state.generation.wrapping_add(1);
  }

  pub fn is_pending(&self) -> bool {
    self.lock().pending.is_some()
  }

  fn lock(&self) -> MutexGuard<'_, TimerState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl Drop for IdleTimer {
  fn drop(&mut self) {
    self.cancel();
  }
}

impl std::fmt::Debug for IdleTimer {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("IdleTimer")
      .field("duration", &self.duration)
      .field("pending", &self.is_pending())
      .finish_non_exhaustive()
  }
}
