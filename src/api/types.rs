//! Request and response shapes shared by the gateway and HTTP clients.

use serde_json::Value;
use std::fmt;

/// Headers every request carries unless the caller opts out.
pub const DEFAULT_HEADERS: &[(&str, &str)] = &[("Content-Type", "application/json")];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Method {
  #[default]
  Get,
  Post,
  Put,
  Delete,
}

impl Method {
  pub fn as_str(&self) -> &'static str {
    match self {
      Method::Get => "GET",
      Method::Post => "POST",
      Method::Put => "PUT",
      Method::Delete => "DELETE",
    }
  }
}

impl fmt::Display for Method {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Request body.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
  /// Serialized as JSON.
  Json(Value),
  /// Sent as-is; pair with `without_default_headers` and a matching content type.
  Raw(Vec<u8>),
}

impl Body {
  pub fn into_bytes(self) -> serde_json::Result<Vec<u8>> {
    match self {
      Body::Json(value) => serde_json::to_vec(&value),
      Body::Raw(bytes) => Ok(bytes),
    }
  }
}

/// Per-call options for [`Gateway::call`](super::Gateway::call).
#[derive(Debug, Clone)]
pub struct RequestOptions {
  pub method: Method,
  /// Caller headers. These override defaults with the same name (case-insensitive).
  pub headers: Vec<(String, String)>,
  pub body: Option<Body>,
  /// Whether to send [`DEFAULT_HEADERS`].
  pub default_headers: bool,
}

impl Default for RequestOptions {
  fn default() -> Self {
    Self {
      method: Method::Get,
      headers: Vec::new(),
      body: None,
      default_headers: true,
    }
  }
}

impl RequestOptions {
  pub fn new(method: Method) -> Self {
    Self {
      method,
      ..Self::default()
    }
  }

  pub fn json(mut self, body: Value) -> Self {
    self.body = Some(Body::Json(body));
    self
  }

  pub fn raw(mut self, bytes: Vec<u8>) -> Self {
    self.body = Some(Body::Raw(bytes));
    self
  }

  pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((name.into(), value.into()));
    self
  }

  /// Send only the caller's headers, e.g. so a multipart body can set its own content type.
  pub fn without_default_headers(mut self) -> Self {
    self.default_headers = false;
    self
  }

  /// Defaults first, then caller headers; a caller header replaces a default of the same name.
  pub fn merged_headers(&self) -> Vec<(String, String)> {
    let mut headers = Vec::with_capacity(DEFAULT_HEADERS.len() + self.headers.len());

    if self.default_headers {
      for (name, value) in DEFAULT_HEADERS {
        let overridden = self
          .headers
          .iter()
          .any(|(n, _)| n.eq_ignore_ascii_case(name));
        if !overridden {
          headers.push((name.to_string(), value.to_string()));
        }
      }
    }

    headers.extend(self.headers.iter().cloned());
    headers
  }
}

/// A fully built request, as handed to an [`HttpClient`](super::HttpClient).
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
  pub method: Method,
  pub url: String,
  pub headers: Vec<(String, String)>,
  pub body: Option<Vec<u8>>,
}

impl HttpRequest {
  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(n, _)| n.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }
}

/// A completed response, whatever its status.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
  pub status: u16,
  pub status_text: String,
  pub body: Vec<u8>,
}

impl HttpResponse {
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_default_content_type() {
    let headers = RequestOptions::default().merged_headers();
    assert_eq!(
      headers,
      vec![("Content-Type".to_string(), "application/json".to_string())]
    );
  }

  #[test]
  fn test_caller_overrides_default_case_insensitively() {
    let headers = RequestOptions::new(Method::Post)
      .header("content-type", "text/csv")
      .header("Authorization", "Bearer t")
      .merged_headers();

    assert_eq!(
      headers,
      vec![
        ("content-type".to_string(), "text/csv".to_string()),
        ("Authorization".to_string(), "Bearer t".to_string()),
      ]
    );
  }

  #[test]
  fn test_defaults_can_be_omitted() {
    let headers = RequestOptions::new(Method::Post)
      .raw(b"--boundary".to_vec())
      .without_default_headers()
      .merged_headers();
    assert!(headers.is_empty());
  }

  #[test]
  fn test_json_body_bytes() {
    let bytes = Body::Json(json!({"name": "Shoe"})).into_bytes().unwrap();
    assert_eq!(bytes, br#"{"name":"Shoe"}"#.to_vec());
  }

  #[test]
  fn test_success_range() {
    let mut response = HttpResponse {
      status: 204,
      status_text: "No Content".to_string(),
      body: Vec::new(),
    };
    assert!(response.is_success());
    response.status = 302;
    assert!(!response.is_success());
  }
}
