//! Result type for stale-while-revalidate lookups.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::task::JoinHandle;
use tracing::warn;

/// Indicates where the immediately available value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fetched from the network because nothing was cached
  Network,
  /// From cache, within its TTL
  CacheFresh,
  /// From cache, past its TTL
  CacheStale,
}

impl CacheSource {
  pub fn is_cached(&self) -> bool {
    !matches!(self, Self::Network)
  }
}

/// The two halves of a stale-while-revalidate call.
///
/// `value` is usable right away. `refreshed` resolves once the background
/// refresh has written the cache, with the fresh value, or `None` if the
/// refresh failed or was never started.
#[derive(Debug)]
pub struct Revalidation {
  pub value: Value,
  pub source: CacheSource,
  /// When the cached value was written (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
  pub refreshed: RefreshHandle,
}

impl Revalidation {
  /// A value fetched in the foreground; nothing left to refresh.
  pub fn fresh(value: Value) -> Self {
    Self {
      value,
      source: CacheSource::Network,
      cached_at: None,
      refreshed: RefreshHandle::settled(),
    }
  }

  /// A cached value with a refresh running behind it.
  pub fn cached(value: Value, timestamp_ms: i64, is_expired: bool, refresh: RefreshHandle) -> Self {
    Self {
      value,
      source: if is_expired {
        CacheSource::CacheStale
      } else {
        CacheSource::CacheFresh
      },
      cached_at: DateTime::<Utc>::from_timestamp_millis(timestamp_ms),
      refreshed: refresh,
    }
  }

  pub fn into_parts(self) -> (Value, RefreshHandle) {
    (self.value, self.refreshed)
  }
}

/// Future for the background refresh.
///
/// Dropping the handle does not cancel the refresh; the cache is still updated.
#[derive(Debug)]
pub struct RefreshHandle {
  task: Option<JoinHandle<Option<Value>>>,
}

impl RefreshHandle {
  pub(crate) fn spawned(task: JoinHandle<Option<Value>>) -> Self {
    Self { task: Some(task) }
  }

  pub(crate) fn settled() -> Self {
    Self { task: None }
  }

  /// Whether a background refresh was started at all.
  pub fn is_pending_refresh(&self) -> bool {
    self.task.is_some()
  }
}

impl Future for RefreshHandle {
  type Output = Option<Value>;

  fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let Some(task) = self.task.as_mut() else {
      return Poll::Ready(None);
    };

    match task.poll_unpin(cx) {
      Poll::Pending => Poll::Pending,
      Poll::Ready(result) => {
        self.task = None;
        Poll::Ready(result.unwrap_or_else(|e| {
          warn!(error = %e, "background refresh task did not complete");
          None
        }))
      }
    }
  }
}
