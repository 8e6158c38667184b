//! Storage wrapper that never fails its caller.

use std::sync::Arc;
use tracing::warn;

use super::KeyValueStore;

/// Shared handle to a storage backend that logs and drops every failure.
///
/// Persistence here is an optimization: a failed read looks like a missing
/// key, a failed write is simply lost.
pub struct PersistedStore<S: KeyValueStore> {
  inner: Arc<S>,
}

impl<S: KeyValueStore> PersistedStore<S> {
  pub fn new(backend: S) -> Self {
    Self {
      inner: Arc::new(backend),
    }
  }

  pub fn from_arc(backend: Arc<S>) -> Self {
    Self { inner: backend }
  }

  /// The wrapped backend, for callers that need to see errors.
  pub fn backend(&self) -> &S {
    &self.inner
  }

  pub fn get(&self, key: &str) -> Option<String> {
    match self.inner.get(key) {
      Ok(value) => value,
      Err(e) => {
        warn!(key, error = %e, "storage read failed");
        None
      }
    }
  }

  /// Write a value. Returns whether it actually reached storage.
  pub fn set(&self, key: &str, value: &str) -> bool {
    match self.inner.set(key, value) {
      Ok(()) => true,
      Err(e) => {
        warn!(key, error = %e, "storage write failed");
        false
      }
    }
  }

  pub fn remove(&self, key: &str) {
    if let Err(e) = self.inner.remove(key) {
      warn!(key, error = %e, "storage remove failed");
    }
  }

  pub fn remove_all_with_prefix(&self, prefix: &str) -> usize {
    match self.inner.remove_all_with_prefix(prefix) {
      Ok(removed) => removed,
      Err(e) => {
        warn!(prefix, error = %e, "storage prefix removal failed");
        0
      }
    }
  }
}

impl<S: KeyValueStore> Clone for PersistedStore<S> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::storage::{DisabledStore, MemoryStore};

  #[test]
  fn test_failures_are_swallowed() {
    let store = PersistedStore::new(DisabledStore);

    assert!(!store.set("a", "1"));
    assert_eq!(store.get("a"), None);
    store.remove("a");
    assert_eq!(store.remove_all_with_prefix("cache:"), 0);
  }

  #[test]
  fn test_clones_share_backend() {
    let store = PersistedStore::new(MemoryStore::new());
    let other = store.clone();

    assert!(store.set("a", "1"));
    assert_eq!(other.get("a").as_deref(), Some("1"));
    assert_eq!(other.backend().len(), 1);
  }
}
