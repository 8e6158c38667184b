use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Path of the login view
pub const LOGIN_PATH: &str = "/login";

/// Signed-in vendor, as persisted under the profile key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
  pub id: String,
  pub email: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub phone: Option<String>,
  #[serde(default)]
  pub business_name: String,
  #[serde(default = "default_plan")]
  pub plan: String,
  #[serde(default = "default_product_limit")]
  pub product_limit: u32,
  pub created_at: DateTime<Utc>,
}

fn default_plan() -> String {
  "free".to_string()
}

fn default_product_limit() -> u32 {
  50
}

impl UserProfile {
  /// A free-plan profile created now.
  pub fn new(email: impl Into<String>, business_name: impl Into<String>) -> Self {
    let created_at = Utc::now();
    Self {
      id: format!("user-{}", created_at.timestamp_millis()),
      email: email.into(),
      phone: None,
      business_name: business_name.into(),
      plan: default_plan(),
      product_limit: default_product_limit(),
      created_at,
    }
  }

  pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
    self.phone = Some(phone.into());
    self
  }
}

/// Where the session monitor currently stands
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
  /// No session, and none expired in this run
  SignedOut,
  Active { user: UserProfile },
  /// Ended by inactivity. Only a new login leaves this state.
  Expired,
}

impl SessionState {
  pub fn is_authenticated(&self) -> bool {
    matches!(self, SessionState::Active { .. })
  }

  pub fn user(&self) -> Option<&UserProfile> {
    match self {
      SessionState::Active { user } => Some(user),
      _ => None,
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      SessionState::SignedOut => "signed out",
      SessionState::Active { .. } => "active",
      SessionState::Expired => "expired",
    }
  }
}

/// Why the user is being sent to the login view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
  Timeout,
}

impl LogoutReason {
  pub fn as_str(&self) -> &'static str {
    match self {
      LogoutReason::Timeout => "timeout",
    }
  }
}

/// Navigation target produced when a session ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
  pub path: &'static str,
  pub reason: Option<LogoutReason>,
}

impl Redirect {
  pub fn login() -> Self {
    Self {
      path: LOGIN_PATH,
      reason: None,
    }
  }

  pub fn timed_out() -> Self {
    Self {
      path: LOGIN_PATH,
      reason: Some(LogoutReason::Timeout),
    }
  }
}

impl fmt::Display for Redirect {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.reason {
      Some(reason) => write!(f, "{}?reason={}", self.path, reason.as_str()),
      None => f.write_str(self.path),
    }
  }
}
