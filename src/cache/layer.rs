//! Cache layer that serves cached responses and revalidates them in the background.

use serde_json::Value;
use tracing::{debug, warn};

use super::revalidation::{RefreshHandle, Revalidation};
use super::store::CacheStore;
use crate::api::{Gateway, HttpClient};
use crate::error::ApiError;
use crate::storage::KeyValueStore;

/// Stale-while-revalidate over a [`CacheStore`] and a [`Gateway`].
///
/// A caller never waits on the network when anything is cached for its key,
/// however old. Concurrent calls for one key each start their own refresh.
pub struct CacheLayer<S: KeyValueStore, C: HttpClient> {
  cache: CacheStore<S>,
  gateway: Gateway<C>,
}

impl<S, C> CacheLayer<S, C>
where
  S: KeyValueStore + 'static,
  C: HttpClient + 'static,
{
  pub fn new(cache: CacheStore<S>, gateway: Gateway<C>) -> Self {
    Self { cache, gateway }
  }

  pub fn cache(&self) -> &CacheStore<S> {
    &self.cache
  }

  pub fn gateway(&self) -> &Gateway<C> {
    &self.gateway
  }

  /// Fetch `endpoint` with a cache-first strategy.
  ///
  /// 1. Check cache - if anything is there, return it immediately and refresh
  ///    in the background; a failed refresh leaves the entry alone
  /// 2. Otherwise fetch in the foreground, cache the result, and propagate errors
  pub async fn cached_api_call(
    &self,
    endpoint: &str,
    cache_key: &str,
  ) -> Result<Revalidation, ApiError> {
    self.revalidate(endpoint, cache_key, None).await
  }

  /// Like [`cached_api_call`](Self::cached_api_call), also invoking `on_fresh`
  /// with the refreshed value after it has been cached.
  pub async fn cached_api_call_with<F>(
    &self,
    endpoint: &str,
    cache_key: &str,
    on_fresh: F,
  ) -> Result<Revalidation, ApiError>
  where
    F: FnOnce(&Value) + Send + 'static,
  {
    self
      .revalidate(endpoint, cache_key, Some(Box::new(on_fresh)))
      .await
  }

  /// Drop a cached entry, typically after a write to the same resource.
  pub fn invalidate(&self, cache_key: &str) {
    self.cache.clear_cache(Some(cache_key));
  }

  async fn revalidate(
    &self,
    endpoint: &str,
    cache_key: &str,
    on_fresh: Option<OnFresh>,
  ) -> Result<Revalidation, ApiError> {
    if let Some(entry) = self.cache.entry(cache_key) {
      let is_expired = self.cache.is_stale(&entry);
      let refresh = self.spawn_refresh(endpoint, cache_key, on_fresh);
      return Ok(Revalidation::cached(
        entry.data,
        entry.timestamp,
        is_expired,
        refresh,
      ));
    }

    // No cache, must fetch from network
    let data = self.gateway.get(endpoint).await?;
    self.cache.set_cache(cache_key, &data);
    Ok(Revalidation::fresh(data))
  }

  fn spawn_refresh(
    &self,
    endpoint: &str,
    cache_key: &str,
    on_fresh: Option<OnFresh>,
  ) -> RefreshHandle {
    let cache = self.cache.clone();
    let gateway = self.gateway.clone();
    let endpoint = endpoint.to_string();
    let cache_key = cache_key.to_string();

    RefreshHandle::spawned(tokio::spawn(async move {
      match gateway.get(&endpoint).await {
        Ok(data) => {
          cache.set_cache(&cache_key, &data);
          debug!(key = %cache_key, "background refresh stored");
          if let Some(on_fresh) = on_fresh {
            on_fresh(&data);
          }
          Some(data)
        }
        Err(e) => {
          // Caller already has a usable value
          warn!(key = %cache_key, error = %e, "background refresh failed");
          None
        }
      }
    }))
  }
}

type OnFresh = Box<dyn FnOnce(&Value) + Send>;

impl<S: KeyValueStore, C: HttpClient> Clone for CacheLayer<S, C> {
  fn clone(&self) -> Self {
    Self {
      cache: self.cache.clone(),
      gateway: self.gateway.clone(),
    }
  }
}
