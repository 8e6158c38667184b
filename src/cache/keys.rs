//! Logical cache keys for dashboard resources.

use std::fmt;
use std::str::FromStr;

use crate::api::endpoints;

/// Dashboard resources that are served stale-while-revalidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resource {
  Products,
  Orders,
  ProfitSummary,
  Dashboard,
}

impl Resource {
  pub const ALL: [Resource; 4] = [
    Resource::Products,
    Resource::Orders,
    Resource::ProfitSummary,
    Resource::Dashboard,
  ];

  /// Base cache key for this resource.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Products => "products",
      Self::Orders => "orders",
      Self::ProfitSummary => "profit_summary",
      Self::Dashboard => "dashboard",
    }
  }

  /// API endpoint the resource is fetched from.
  pub fn endpoint(&self) -> &'static str {
    match self {
      Self::Products => endpoints::PRODUCTS,
      Self::Orders => endpoints::ORDERS,
      Self::ProfitSummary => endpoints::PROFIT_SUMMARY,
      Self::Dashboard => endpoints::DASHBOARD_SUMMARY,
    }
  }
}

impl FromStr for Resource {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let normalized = s.trim().to_lowercase().replace('-', "_");
    Self::ALL
      .into_iter()
      .find(|r| r.as_str() == normalized)
      .ok_or_else(|| format!("unknown resource: {}", s))
  }
}

/// A cache key, optionally scoped to one user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheKey {
  pub resource: Resource,
  pub user: Option<String>,
}

impl CacheKey {
  pub fn new(resource: Resource) -> Self {
    Self {
      resource,
      user: None,
    }
  }

  /// Scope the key to a user so accounts sharing a device don't see each other's data.
  pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
    self.user = Some(user_id.into());
    self
  }

  pub fn endpoint(&self) -> &'static str {
    self.resource.endpoint()
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.user {
      Some(user) => write!(f, "{}:{}", self.resource.as_str(), user),
      None => f.write_str(self.resource.as_str()),
    }
  }
}

impl From<Resource> for CacheKey {
  fn from(resource: Resource) -> Self {
    Self::new(resource)
  }
}
