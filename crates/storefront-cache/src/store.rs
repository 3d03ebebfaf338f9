//! The cache store abstraction.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{CacheError, Result};

/// A key-value store with per-entry TTL and glob key enumeration.
///
/// Implementations report every failure; none of them swallow errors. Keys
/// follow the `family:subkind:identifier` convention and patterns use Redis
/// `KEYS` glob syntax.
#[async_trait]
pub trait CacheStore: Send + Sync + 'static {
    /// Short name for logs and status output (`"redis"`, `"memory"`).
    fn backend_name(&self) -> &'static str;

    /// Returns the stored bytes, or `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Stores `value` under `key`, replacing any previous entry and its TTL.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;

    /// Removes `key`. Returns whether an entry was removed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Lists the live keys matching `pattern`.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;

    /// Removes every listed key. Returns how many entries were removed.
    async fn delete_many(&self, keys: &[String]) -> Result<u64>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// Time left before `key` expires. `None` when the key is absent.
    async fn ttl_remaining(&self, key: &str) -> Result<Option<Duration>>;

    /// Removes every key matching `pattern`.
    ///
    /// Not atomic: keys written between enumeration and deletion survive.
    async fn clear_pattern(&self, pattern: &str) -> Result<u64> {
        let keys = self.keys(pattern).await?;
        if keys.is_empty() {
            return Ok(0);
        }
        self.delete_many(&keys).await
    }
}

/// Longest TTL a store accepts.
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// TTL in whole milliseconds. Rejects TTLs that round down to zero or exceed
/// [`MAX_TTL`].
pub(crate) fn ttl_millis(key: &str, ttl: Duration) -> Result<u64> {
    if ttl > MAX_TTL {
        return Err(CacheError::invalid_ttl(key));
    }
    match u64::try_from(ttl.as_millis()) {
        Ok(0) | Err(_) => Err(CacheError::invalid_ttl(key)),
        Ok(millis) => Ok(millis),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_millis_bounds() {
        assert_eq!(ttl_millis("k", Duration::from_secs(2)).unwrap(), 2000);
        assert!(ttl_millis("k", Duration::ZERO).is_err());
        assert!(ttl_millis("k", Duration::from_micros(10)).is_err());
        assert_eq!(ttl_millis("k", MAX_TTL).unwrap(), 31_536_000_000);
        assert!(ttl_millis("k", MAX_TTL + Duration::from_millis(1)).is_err());
        assert!(ttl_millis("k", Duration::MAX).is_err());
    }
}
