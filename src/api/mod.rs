//! JSON-over-HTTP access to the dashboard backend.

mod client;
pub mod endpoints;
mod gateway;
mod types;

pub use client::{HttpClient, ReqwestClient};
pub use gateway::{Gateway, REQUEST_TIMEOUT};
pub use types::{Body, HttpRequest, HttpResponse, Method, RequestOptions, DEFAULT_HEADERS};
