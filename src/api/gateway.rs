//! Request gateway: one HTTP call with a hard deadline and typed failures.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::client::HttpClient;
use super::types::{HttpRequest, Method, RequestOptions};
use crate::error::ApiError;

/// Deadline for every request: 10 seconds.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Issues requests against a fixed base URL.
pub struct Gateway<C: HttpClient> {
  client: Arc<C>,
  base_url: String,
}

impl<C: HttpClient> Gateway<C> {
  pub fn new(client: C, base_url: impl Into<String>) -> Self {
    let base_url = base_url.into().trim_end_matches('/').to_string();
    Self {
      client: Arc::new(client),
      base_url,
    }
  }

  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  /// Full URL for an endpoint such as `/products`.
  pub fn url(&self, endpoint: &str) -> String {
    format!("{}{}", self.base_url, endpoint)
  }

  /// Send one request and return its parsed JSON body.
  ///
  /// If the deadline passes first the in-flight request is dropped, which
  /// aborts it, and the call fails with [`ApiError::Timeout`]. Whichever of
  /// response and deadline settles first decides the outcome.
  pub async fn call(&self, endpoint: &str, options: RequestOptions) -> Result<Value, ApiError> {
    let headers = options.merged_headers();
    let body = options.body.map(|b| b.into_bytes()).transpose()?;
    let request = HttpRequest {
      method: options.method,
      url: self.url(endpoint),
      headers,
      body,
    };

    debug!(method = %request.method, url = %request.url, "sending request");

    let response = match tokio::time::timeout(REQUEST_TIMEOUT, self.client.execute(request)).await
    {
      Ok(Ok(response)) => response,
      Ok(Err(e)) => {
        warn!(endpoint, error = %e, "API call failed");
        return Err(e);
      }
      Err(_) => {
        warn!(endpoint, "API call timed out");
        return Err(ApiError::Timeout);
      }
    };

    if !response.is_success() {
      debug!(endpoint, status = response.status, "API call rejected");
      return Err(ApiError::Http {
        status: response.status,
        status_text: response.status_text,
      });
    }

    parse_body(&response.body)
  }

  pub async fn get(&self, endpoint: &str) -> Result<Value, ApiError> {
    self.call(endpoint, RequestOptions::default()).await
  }

  pub async fn post(&self, endpoint: &str, body: Value) -> Result<Value, ApiError> {
    self
      .call(endpoint, RequestOptions::new(Method::Post).json(body))
      .await
  }

  pub async fn put(&self, endpoint: &str, body: Value) -> Result<Value, ApiError> {
    self
      .call(endpoint, RequestOptions::new(Method::Put).json(body))
      .await
  }

  pub async fn delete(&self, endpoint: &str) -> Result<Value, ApiError> {
    self.call(endpoint, RequestOptions::new(Method::Delete)).await
  }
}

impl<C: HttpClient> Clone for Gateway<C> {
  fn clone(&self) -> Self {
    Self {
      client: Arc::clone(&self.client),
      base_url: self.base_url.clone(),
    }
  }
}

/// Empty bodies (204, or a 200 with nothing in it) read as `null`.
fn parse_body(body: &[u8]) -> Result<Value, ApiError> {
  if body.iter().all(u8::is_ascii_whitespace) {
    return Ok(Value::Null);
  }
  Ok(serde_json::from_slice(body)?)
}
