//! Cache store for reading and writing cached API responses.
//!
//! Entries are `{data, timestamp}` JSON envelopes stored under `cache:<key>`.
//! Staleness is computed at read time and never removes data.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::clock::{duration_ms, Clock};
use crate::storage::{KeyValueStore, PersistedStore};

/// Prefix separating cache entries from every other storage key.
pub const CACHE_PREFIX: &str = "cache:";

/// How long an entry counts as fresh: 5 minutes.
pub const CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// A cached response with its write time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
  /// Logical key, without the namespace prefix. Not part of the stored envelope.
  #[serde(skip)]
  pub key: String,
  /// The cached payload.
  pub data: Value,
  /// When the payload was written, in epoch milliseconds.
  pub timestamp: i64,
}

impl CacheEntry {
  /// Check whether the entry is older than `ttl` at `now_ms`.
  pub fn is_expired(&self, now_ms: i64, ttl: Duration) -> bool {
    now_ms.saturating_sub(self.timestamp) > duration_ms(ttl)
  }
}

/// What a cache lookup hands back: the data, and whether it is past its TTL.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRead {
  pub data: Value,
  pub is_expired: bool,
}

/// Typed cache over a [`PersistedStore`].
pub struct CacheStore<S: KeyValueStore> {
  store: PersistedStore<S>,
  clock: Arc<dyn Clock>,
}

impl<S: KeyValueStore> CacheStore<S> {
  pub fn new(store: PersistedStore<S>, clock: Arc<dyn Clock>) -> Self {
    Self { store, clock }
  }

  /// Storage key for a logical cache key.
  pub fn storage_key(key: &str) -> String {
    format!("{}{}", CACHE_PREFIX, key)
  }

  /// Read the raw entry. Corrupt envelopes read as a miss.
  pub fn entry(&self, key: &str) -> Option<CacheEntry> {
    let raw = self.store.get(&Self::storage_key(key))?;

    match serde_json::from_str::<CacheEntry>(&raw) {
      Ok(mut entry) => {
        entry.key = key.to_string();
        Some(entry)
      }
      Err(e) => {
        warn!(key, error = %e, "ignoring corrupt cache entry");
        None
      }
    }
  }

  /// Read an entry along with its staleness.
  pub fn get_cache(&self, key: &str) -> Option<CacheRead> {
    let Some(entry) = self.entry(key) else {
      debug!(key, "cache miss");
      return None;
    };

    let is_expired = self.is_stale(&entry);
    debug!(key, is_expired, "cache hit");
    Some(CacheRead {
      data: entry.data,
      is_expired,
    })
  }

  /// Whether `entry` is past the TTL right now.
  pub fn is_stale(&self, entry: &CacheEntry) -> bool {
    entry.is_expired(self.clock.now_ms(), CACHE_TTL)
  }

  /// Store `data` stamped with the current time. Failures are logged and dropped.
  pub fn set_cache<T: Serialize + ?Sized>(&self, key: &str, data: &T) {
    let data = match serde_json::to_value(data) {
      Ok(data) => data,
      Err(e) => {
        warn!(key, error = %e, "failed to serialize cache entry");
        return;
      }
    };

    let entry = CacheEntry {
      key: key.to_string(),
      data,
      timestamp: self.clock.now_ms(),
    };

    match serde_json::to_string(&entry) {
      Ok(json) => {
        if !self.store.set(&Self::storage_key(key), &json) {
          warn!(key, "failed to cache");
        }
      }
      Err(e) => warn!(key, error = %e, "failed to serialize cache entry"),
    }
  }

  /// Remove one entry, or every cache entry when `key` is `None`.
  ///
  /// Keys outside the cache namespace are never touched.
  pub fn clear_cache(&self, key: Option<&str>) {
    match key {
      Some(key) => self.store.remove(&Self::storage_key(key)),
      None => {
        let removed = self.store.remove_all_with_prefix(CACHE_PREFIX);
        debug!(removed, "cleared cache");
      }
    }
  }
}

impl<S: KeyValueStore> Clone for CacheStore<S> {
  fn clone(&self) -> Self {
    Self {
      store: self.store.clone(),
      clock: Arc::clone(&self.clock),
    }
  }
}
