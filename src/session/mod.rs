//! User session lifecycle and inactivity logout.

mod monitor;
mod timer;
mod types;

pub use monitor::{SessionMonitor, HEARTBEAT_INTERVAL, HEARTBEAT_KEY, IDLE_TIMEOUT, PROFILE_KEY};
pub use timer::IdleTimer;
pub use types::{LogoutReason, Redirect, SessionState, UserProfile, LOGIN_PATH};
