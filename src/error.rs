//! Error types for the request gateway and the storage layer.
//!
//! Gateway failures are surfaced to foreground callers. Storage failures never
//! leave the storage/cache layer; they are logged and dropped there.

use thiserror::Error;

/// Boxed transport error coming out of an [`HttpClient`](crate::api::HttpClient).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum ApiError {
  /// The request did not settle before the gateway deadline.
  #[error("API request timed out after 10 seconds")]
  Timeout,

  /// The server answered with a non-2xx status.
  #[error("API Error: {status} {status_text}")]
  Http { status: u16, status_text: String },

  /// DNS, connection refused, TLS and every other transport failure.
  #[error("Network error: {0}")]
  Network(#[source] BoxError),

  /// A 2xx response whose body is not valid JSON.
  #[error("Invalid JSON response: {0}")]
  Decode(#[from] serde_json::Error),
}

impl ApiError {
  pub fn network(err: impl Into<BoxError>) -> Self {
    Self::Network(err.into())
  }

  pub fn is_timeout(&self) -> bool {
    matches!(self, Self::Timeout)
  }

  /// HTTP status code, if the server answered at all.
  pub fn status(&self) -> Option<u16> {
    match self {
      Self::Http { status, .. } => Some(*status),
      _ => None,
    }
  }
}

#[derive(Error, Debug)]
pub enum StorageError {
  #[error("Storage is unavailable")]
  Unavailable,

  #[error("Storage quota exceeded writing {key}: {needed} bytes needed, {available} available")]
  QuotaExceeded {
    key: String,
    needed: usize,
    available: usize,
  },

  #[error("SQLite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),

  #[error("Storage lock poisoned")]
  Poisoned,
}
