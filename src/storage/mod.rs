//! Durable string-keyed storage.
//!
//! This is the persistence port everything else sits on:
//! - [`KeyValueStore`] is the fallible backend contract
//! - [`SqliteStore`] keeps values on disk across restarts
//! - [`MemoryStore`] and [`DisabledStore`] are in-process backends
//! - [`PersistedStore`] applies the "never fail the caller" policy on top of any backend

mod memory;
mod persisted;
mod sqlite;

pub use memory::{DisabledStore, MemoryStore};
pub use persisted::PersistedStore;
pub use sqlite::SqliteStore;

use crate::error::StorageError;

/// Trait for storage backends.
///
/// Keys share one global namespace, so callers are expected to prefix them
/// (`cache:`, `session:`).
pub trait KeyValueStore: Send + Sync {
  /// Read a value.
  fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

  /// Write a value, replacing any previous one.
  fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

  /// Remove a value. Removing a missing key is not an error.
  fn remove(&self, key: &str) -> Result<(), StorageError>;

  /// All keys starting with `prefix`, in key order.
  fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

  /// Remove every key starting with `prefix`. Returns how many were removed.
  fn remove_all_with_prefix(&self, prefix: &str) -> Result<usize, StorageError> {
    let keys = self.keys_with_prefix(prefix)?;
    for key in &keys {
      self.remove(key)?;
    }
    Ok(keys.len())
  }
}
