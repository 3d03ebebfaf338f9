//! Cache-aside orchestration.
//!
//! [`CacheService`] is the fail-open boundary of the cache: store failures are
//! logged and turned into misses or dropped writes so an unreachable cache
//! degrades to "always recompute" instead of failing requests.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::error::CacheError;
use crate::metrics;
use crate::policy::{CacheKey, FAMILY_PATTERNS, TtlPolicy};
use crate::store::CacheStore;

/// Typed cache-aside access over a [`CacheStore`].
#[derive(Clone)]
pub struct CacheService {
    store: Arc<dyn CacheStore>,
    policy: Arc<TtlPolicy>,
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("backend", &self.store.backend_name())
            .field("policy", &self.policy)
            .finish()
    }
}

impl CacheService {
    pub fn new(store: Arc<dyn CacheStore>, policy: TtlPolicy) -> Self {
        Self {
            store,
            policy: Arc::new(policy),
        }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn policy(&self) -> &TtlPolicy {
        &self.policy
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Returns the decoded value, or `None` on a miss.
    ///
    /// Store failures count as misses. An entry that no longer decodes as `T`
    /// is deleted and reported as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = match self.store.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %key, error = %e, category = %e.category(), "cache GET failed");
                metrics::record_store_error("get");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "undecodable cache entry, dropping it");
                metrics::record_store_error("decode");
                self.del(key).await;
                None
            }
        }
    }

    /// Stores `value` under `key`. Failures are logged and dropped.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) {
        match encode(value) {
            Ok(bytes) => self.write(key, bytes, ttl).await,
            Err(e) => {
                warn!(key = %key, error = %e, "cache SET skipped, value not serializable");
                metrics::record_store_error("encode");
            }
        }
    }

    /// Removes one entry. Returns whether it existed; failures read as `false`.
    pub async fn del(&self, key: &str) -> bool {
        match self.store.delete(key).await {
            Ok(removed) => {
                debug!(key = %key, removed, "cache entry invalidated");
                removed
            }
            Err(e) => {
                warn!(key = %key, error = %e, "cache DEL failed");
                metrics::record_store_error("delete");
                false
            }
        }
    }

    /// Removes every key matching `pattern`. Failures read as zero removed.
    ///
    /// Best effort: keys written while the sweep runs may survive it.
    pub async fn clear_pattern(&self, pattern: &str) -> u64 {
        match self.store.clear_pattern(pattern).await {
            Ok(removed) => {
                debug!(pattern = %pattern, removed, "cache pattern cleared");
                metrics::record_invalidated(pattern, removed);
                removed
            }
            Err(e) => {
                warn!(pattern = %pattern, error = %e, "cache pattern clear failed");
                metrics::record_store_error("clear_pattern");
                0
            }
        }
    }

    /// Returns the cached value for `key`, or runs `fetch` and caches its
    /// result for `ttl`.
    ///
    /// A failing `fetch` propagates its error and caches nothing. Concurrent
    /// misses on the same key are not coalesced: each caller runs its own
    /// `fetch` and the last write wins.
    #[instrument(skip_all, fields(key = %key), level = "debug")]
    pub async fn with_cache<T, E>(
        &self,
        key: &str,
        fetch: impl AsyncFnOnce() -> Result<T, E>,
        ttl: Duration,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
    {
        if let Some(hit) = self.get::<T>(key).await {
            debug!("cache hit");
            metrics::record_cache_hit(self.store.backend_name());
            return Ok(hit);
        }
        debug!("cache miss");
        metrics::record_cache_miss();

        let value = fetch().await?;
        self.set(key, &value, ttl).await;
        Ok(value)
    }

    /// [`with_cache`](Self::with_cache) with the key rendered from `key` and
    /// the TTL taken from the policy for its kind.
    pub async fn with_policy<T, E>(
        &self,
        key: CacheKey<'_>,
        fetch: impl AsyncFnOnce() -> Result<T, E>,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
    {
        let ttl = self.policy.ttl(key.kind());
        self.with_cache(&key.to_string(), fetch, ttl).await
    }

    /// Live key count per top-level family. Families whose enumeration failed
    /// are left out.
    pub async fn family_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for pattern in FAMILY_PATTERNS {
            match self.store.keys(pattern).await {
                Ok(keys) => {
                    metrics::set_cache_entries(pattern, keys.len());
                    counts.insert(pattern, keys.len());
                }
                Err(e) => {
                    warn!(pattern = %pattern, error = %e, "cache key enumeration failed");
                    metrics::record_store_error("keys");
                }
            }
        }
        counts
    }

    /// Writes on a spawned task and waits for it, so dropping the caller's
    /// future mid-write does not abort the write.
    async fn write(&self, key: &str, bytes: Vec<u8>, ttl: Duration) {
        let store = Arc::clone(&self.store);
        let key = key.to_string();
        let task = tokio::spawn(async move {
            match store.set(&key, bytes, ttl).await {
                Ok(()) => debug!(key = %key, ttl_secs = ttl.as_secs(), "cache set"),
                Err(e) => {
                    warn!(key = %key, error = %e, category = %e.category(), "cache SET failed");
                    metrics::record_store_error("set");
                }
            }
        });
        if let Err(e) = task.await {
            warn!(error = %e, "cache write task failed");
        }
    }
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CacheError> {
    Ok(serde_json::to_vec(value)?)
}
