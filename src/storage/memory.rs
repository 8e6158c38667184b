//! In-process storage backends.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::KeyValueStore;
use crate::error::StorageError;

/// Map-backed storage with an optional byte quota.
///
/// Used as the in-memory substitute for the durable store, and to reproduce
/// quota failures.
#[derive(Debug, Default)]
pub struct MemoryStore {
  entries: Mutex<BTreeMap<String, String>>,
  quota: Option<usize>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Limit the total size of keys plus values to `bytes`.
  pub fn with_quota(bytes: usize) -> Self {
    Self {
      entries: Mutex::default(),
      quota: Some(bytes),
    }
  }

  pub fn len(&self) -> usize {
    self.lock().map(|entries| entries.len()).unwrap_or(0)
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, String>>, StorageError> {
    self.entries.lock().map_err(|_| StorageError::Poisoned)
  }
}

impl KeyValueStore for MemoryStore {
  fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
    Ok(self.lock()?.get(key).cloned())
  }

  fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
    let mut entries = self.lock()?;

    if let Some(quota) = self.quota {
      let used: usize = entries
        .iter()
        .filter(|(k, _)| k.as_str() != key)
        .map(|(k, v)| k.len() + v.len())
        .sum();
      let needed = key.len() + value.len();
      if used + needed > quota {
        return Err(StorageError::QuotaExceeded {
          key: key.to_string(),
          needed,
          available: quota.saturating_sub(used),
        });
      }
    }

    entries.insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<(), StorageError> {
    self.lock()?.remove(key);
    Ok(())
  }

  fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
    Ok(
      self
        .lock()?
        .keys()
        .filter(|k| k.starts_with(prefix))
        .cloned()
        .collect(),
    )
  }
}

/// Storage that refuses every operation, like a browser with storage turned off.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledStore;

impl KeyValueStore for DisabledStore {
  fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
    Err(StorageError::Unavailable)
  }

  fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
    Err(StorageError::Unavailable)
  }

  fn remove(&self, _key: &str) -> Result<(), StorageError> {
    Err(StorageError::Unavailable)
  }

  fn keys_with_prefix(&self, _prefix: &str) -> Result<Vec<String>, StorageError> {
    Err(StorageError::Unavailable)
  }
}
