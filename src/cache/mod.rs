//! Stale-while-revalidate caching for API responses.
//!
//! This module provides:
//! - [`CacheStore`]: `{data, timestamp}` envelopes under the `cache:` namespace
//! - [`CacheLayer`]: serve whatever is cached at once, refresh it in the background
//! - [`CacheKey`]: logical keys for dashboard resources, optionally per user
//!
//! Staleness only decides what gets reported; entries are never evicted by age.

mod keys;
mod layer;
mod revalidation;
mod store;

pub use keys::{CacheKey, Resource};
pub use layer::CacheLayer;
pub use revalidation::{CacheSource, RefreshHandle, Revalidation};
pub use store::{CacheEntry, CacheRead, CacheStore, CACHE_PREFIX, CACHE_TTL};
