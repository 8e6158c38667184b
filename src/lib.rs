//! Client resilience core for the KOFA vendor dashboard.
//!
//! - [`api`]: request gateway with a fixed deadline and typed failures
//! - [`cache`]: stale-while-revalidate caching over persisted storage
//! - [`session`]: inactivity logout with a persisted heartbeat
//! - [`storage`]: the key-value stores everything above persists to

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod session;
pub mod storage;
