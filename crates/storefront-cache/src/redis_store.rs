//! Redis-backed cache store.

use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Connection, Pool};
use redis::AsyncCommands;

use crate::error::Result;
use crate::store::{CacheStore, ttl_millis};

/// Shared store for multi-instance deployments.
///
/// An optional namespace is prepended to every key on the way in and stripped
/// from enumerated keys on the way out, so callers only ever see bare keys.
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
    namespace: Option<String>,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("namespace", &self.namespace)
            .field("pool", &self.pool.status())
            .finish()
    }
}

impl RedisStore {
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            namespace: None,
        }
    }

    /// Prefixes every key with `namespace`. Empty namespaces are ignored.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        self.namespace = (!namespace.is_empty()).then_some(namespace);
        self
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Round-trips a `PING` (for health checks).
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn conn(&self) -> Result<Connection> {
        Ok(self.pool.get().await?)
    }

    fn full_key<'a>(&self, key: &'a str) -> Cow<'a, str> {
        match &self.namespace {
            Some(ns) => Cow::Owned(format!("{ns}{key}")),
            None => Cow::Borrowed(key),
        }
    }

    fn strip_namespace(&self, key: String) -> String {
        match &self.namespace {
            Some(ns) => match key.strip_prefix(ns.as_str()) {
                Some(bare) => bare.to_string(),
                None => key,
            },
            None => key,
        }
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn().await?;
        let value = conn
            .get::<_, Option<Vec<u8>>>(self.full_key(key).as_ref())
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let millis = ttl_millis(key, ttl)?;
        let mut conn = self.conn().await?;
        conn.pset_ex::<_, _, ()>(self.full_key(key).as_ref(), value, millis)
            .await?;
        tracing::debug!(key = %key, ttl_ms = millis, "cache set (redis)");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn().await?;
        let removed = conn.del::<_, u64>(self.full_key(key).as_ref()).await?;
        Ok(removed > 0)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.conn().await?;
        let keys = conn
            .keys::<_, Vec<String>>(self.full_key(pattern).as_ref())
            .await?;
        Ok(keys
            .into_iter()
            .map(|key| self.strip_namespace(key))
            .collect())
    }

    async fn delete_many(&self, keys: &[String]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let full: Vec<String> = keys
            .iter()
            .map(|key| self.full_key(key).into_owned())
            .collect();
        let mut conn = self.conn().await?;
        let removed = conn.del::<_, u64>(full).await?;
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn().await?;
        let exists = conn.exists::<_, bool>(self.full_key(key).as_ref()).await?;
        Ok(exists)
    }

    async fn ttl_remaining(&self, key: &str) -> Result<Option<Duration>> {
        let mut conn = self.conn().await?;
        let pttl = conn.pttl::<_, i64>(self.full_key(key).as_ref()).await?;
        // -2: no such key, -1: key without expiry.
        Ok(match pttl {
            -2 => None,
            -1 => Some(Duration::MAX),
            millis => Some(Duration::from_millis(millis.max(0) as u64)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deadpool_redis::{Config, Runtime};

    fn store() -> RedisStore {
        // Pool creation is lazy; nothing connects until a command runs.
        let pool = Config::from_url("redis://127.0.0.1:6379")
            .create_pool(Some(Runtime::Tokio1))
            .unwrap();
        RedisStore::new(pool)
    }

    #[test]
    fn test_namespace_applied_and_stripped() {
        let store = store().with_namespace("shop:");
        assert_eq!(store.full_key("products:all"), "shop:products:all");
        assert_eq!(store.full_key("products:*"), "shop:products:*");
        assert_eq!(
            store.strip_namespace("shop:products:all".to_string()),
            "products:all"
        );
    }

    #[test]
    fn test_empty_namespace_ignored() {
        let store = store().with_namespace("");
        assert_eq!(store.namespace(), None);
        assert!(matches!(store.full_key("user:1"), Cow::Borrowed("user:1")));
        assert_eq!(store.strip_namespace("user:1".to_string()), "user:1");
    }
}
