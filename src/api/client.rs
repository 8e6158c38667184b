//! HTTP client port and its reqwest implementation.

use async_trait::async_trait;
use reqwest::Client;

use super::types::{HttpRequest, HttpResponse, Method};
use crate::error::ApiError;

/// Sends one request and returns the response, whatever its status.
///
/// Implementations report transport failures as [`ApiError::Network`] and
/// leave status handling and deadlines to the [`Gateway`](super::Gateway).
#[async_trait]
pub trait HttpClient: Send + Sync {
  async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError>;
}

/// HTTP client wrapper backed by reqwest.
#[derive(Clone)]
pub struct ReqwestClient {
  client: Client,
}

impl ReqwestClient {
  pub fn new() -> Result<Self, ApiError> {
    let client = Client::builder()
      .user_agent(concat!("kofa/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(ApiError::network)?;

    Ok(Self { client })
  }
}

#[async_trait]
impl HttpClient for ReqwestClient {
  async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
    let method = match request.method {
      Method::Get => reqwest::Method::GET,
      Method::Post => reqwest::Method::POST,
      Method::Put => reqwest::Method::PUT,
      Method::Delete => reqwest::Method::DELETE,
    };

    let mut builder = self.client.request(method, &request.url);
    for (name, value) in &request.headers {
      builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(body) = request.body {
      builder = builder.body(body);
    }

    let response = builder.send().await.map_err(ApiError::network)?;

    let status = response.status();
    let status_text = status.canonical_reason().unwrap_or_default().to_string();
    let body = response.bytes().await.map_err(ApiError::network)?.to_vec();

    Ok(HttpResponse {
      status: status.as_u16(),
      status_text,
      body,
    })
  }
}
