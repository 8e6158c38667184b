//! SQLite-backed key-value storage.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::KeyValueStore;
use crate::error::StorageError;

/// SQLite-based storage implementation.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open or create the store at the default location.
  pub fn open() -> Result<Self, StorageError> {
    Self::open_at(&Self::default_path()?)
  }

  /// Open or create the store at `path`.
  pub fn open_at(path: &Path) -> Result<Self, StorageError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)?;
    Self::with_connection(conn)
  }

  /// Open a throwaway store that lives as long as the value.
  pub fn open_in_memory() -> Result<Self, StorageError> {
    Self::with_connection(Connection::open_in_memory()?)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf, StorageError> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or(StorageError::Unavailable)?;

    Ok(data_dir.join("kofa").join("storage.db"))
  }

  fn with_connection(conn: Connection) -> Result<Self, StorageError> {
    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;
    Ok(store)
  }

  fn run_migrations(&self) -> Result<(), StorageError> {
    self.lock()?.execute_batch(SCHEMA)?;
    Ok(())
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
    self.conn.lock().map_err(|_| StorageError::Poisoned)
  }
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl KeyValueStore for SqliteStore {
  fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
    let conn = self.lock()?;
    let value = conn
      .query_row("SELECT value FROM kv WHERE key = ?", params![key], |row| {
        row.get(0)
      })
      .optional()?;
    Ok(value)
  }

  fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
    let conn = self.lock()?;
    conn.execute(
      "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?, ?, datetime('now'))",
      params![key, value],
    )?;
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<(), StorageError> {
    let conn = self.lock()?;
    conn.execute("DELETE FROM kv WHERE key = ?", params![key])?;
    Ok(())
  }

  fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
    let conn = self.lock()?;
    // substr() instead of LIKE so '%' and '_' in prefixes match literally
    let mut stmt =
      conn.prepare("SELECT key FROM kv WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key")?;
    let keys = stmt
      .query_map(params![prefix], |row| row.get(0))?
      .collect::<Result<Vec<String>, _>>()?;
    Ok(keys)
  }

  fn remove_all_with_prefix(&self, prefix: &str) -> Result<usize, StorageError> {
    let conn = self.lock()?;
    let removed = conn.execute(
      "DELETE FROM kv WHERE substr(key, 1, length(?1)) = ?1",
      params![prefix],
    )?;
    Ok(removed)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn test_values_survive_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("storage.db");

    {
      let store = SqliteStore::open_at(&path).unwrap();
      store.set("session:user", "{\"id\":\"user-1\"}").unwrap();
    }

    let store = SqliteStore::open_at(&path).unwrap();
    assert_eq!(
      store.get("session:user").unwrap().as_deref(),
      Some("{\"id\":\"user-1\"}")
    );
  }

  #[test]
  fn test_set_overwrites() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.set("a", "1").unwrap();
    store.set("a", "2").unwrap();
    assert_eq!(store.get("a").unwrap().as_deref(), Some("2"));
    assert_eq!(store.keys_with_prefix("").unwrap(), vec!["a".to_string()]);
  }

  #[test]
  fn test_remove_missing_key_is_ok() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.remove("nothing").unwrap();
    assert_eq!(store.get("nothing").unwrap(), None);
  }

  #[test]
  fn test_prefix_removal_is_literal() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.set("cache:products", "[]").unwrap();
    store.set("cache:orders", "[]").unwrap();
    store.set("cacheX", "keep").unwrap();
    store.set("session:user", "keep").unwrap();
    store.set("c%che:odd", "keep").unwrap();

    assert_eq!(
      store.keys_with_prefix("cache:").unwrap(),
      vec!["cache:orders".to_string(), "cache:products".to_string()]
    );

    let removed = store.remove_all_with_prefix("cache:").unwrap();
    assert_eq!(removed, 2);
    assert_eq!(store.get("cacheX").unwrap().as_deref(), Some("keep"));
    assert_eq!(store.get("session:user").unwrap().as_deref(), Some("keep"));
    assert_eq!(store.get("c%che:odd").unwrap().as_deref(), Some("keep"));

    // LIKE would treat '%' as a wildcard and also match "cacheX"
    assert_eq!(
      store.keys_with_prefix("c%").unwrap(),
      vec!["c%che:odd".to_string()]
    );
  }
}
