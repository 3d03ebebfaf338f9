pub mod config;
pub mod datastore;
pub mod metrics;
pub mod observability;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde_json::Value;
use storefront_cache::{CacheKey, CacheService, CacheStore, Invalidator, MemoryStore, RedisStore};
use storefront_pool::{QueryExecutor, ResourcePool};
use tokio::task::JoinHandle;

pub use config::{AppConfig, CacheConfig, DataStoreConfig, PoolSettings, RedisConfig};
pub use datastore::{DataStoreClient, DataStoreError, DataStoreFactory};
pub use observability::{apply_logging_level, init_tracing};

/// The cache store picked at startup, plus the sweeper task when it is the
/// in-process store.
pub struct CacheBackend {
    pub store: Arc<dyn CacheStore>,
    sweeper: Option<JoinHandle<()>>,
}

impl CacheBackend {
    fn memory(sweep_every: Duration) -> Self {
        let store = MemoryStore::new();
        let sweeper = store.spawn_sweeper(sweep_every);
        Self {
            store: Arc::new(store),
            sweeper: Some(sweeper),
        }
    }

    pub fn has_sweeper(&self) -> bool {
        self.sweeper.is_some()
    }
}

/// Create a cache store based on configuration.
///
/// ## Cache Modes
///
/// - **Redis disabled**: Returns an in-process store (DashMap), swept for
///   expired entries every `sweep_every`
/// - **Redis enabled**: Attempts to connect to Redis, falls back to in-process on failure
///
/// ## Graceful Degradation
///
/// If the Redis connection fails, the process keeps running with a
/// per-instance cache instead of failing to start.
pub async fn create_cache_store(config: &RedisConfig, sweep_every: Duration) -> CacheBackend {
    if !config.enabled {
        tracing::info!("Redis disabled, using in-process cache");
        return CacheBackend::memory(sweep_every);
    }

    tracing::info!(url = %config.url, "Connecting to Redis");

    // Create Redis pool configuration
    let mut redis_config = deadpool_redis::Config::from_url(&config.url);
    let timeout = Duration::from_millis(config.timeout_ms);
    let mut pool_config = deadpool_redis::PoolConfig::new(config.pool_size);
    pool_config.timeouts.wait = Some(timeout);
    pool_config.timeouts.create = Some(timeout);
    pool_config.timeouts.recycle = Some(timeout);
    redis_config.pool = Some(pool_config);

    let pool = match redis_config.create_pool(Some(deadpool_redis::Runtime::Tokio1)) {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to create Redis pool. Falling back to in-process cache."
            );
            return CacheBackend::memory(sweep_every);
        }
    };

    let mut store = RedisStore::new(pool);
    if let Some(namespace) = &config.namespace {
        store = store.with_namespace(namespace.clone());
    }

    // Test connection
    match store.ping().await {
        Ok(()) => {
            tracing::info!("Connected to Redis");
            CacheBackend {
                store: Arc::new(store),
                sweeper: None,
            }
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to connect to Redis. Falling back to in-process cache."
            );
            CacheBackend::memory(sweep_every)
        }
    }
}

/// Everything a request handler needs: pooled data store access, the cache
/// and the invalidator, built from one [`AppConfig`].
pub struct AppState {
    pub executor: QueryExecutor<DataStoreFactory>,
    pub cache: CacheService,
    pub invalidator: Invalidator,
    reaper: JoinHandle<()>,
    sweeper: Option<JoinHandle<()>>,
}

impl AppState {
    /// Builds the pool (and starts its reaper) and the cache layer.
    ///
    /// Must run inside a Tokio runtime.
    pub async fn build(config: &AppConfig) -> anyhow::Result<Self> {
        let pool = ResourcePool::new(
            DataStoreFactory::new(config.datastore.clone()),
            config.pool_config(),
        )
        .context("invalid pool configuration")?;
        let reaper = pool.spawn_reaper(config.reap_interval());

        let backend = create_cache_store(&config.redis, config.cache.sweep_interval()).await;
        let policy = config.ttl_policy().context("invalid cache TTLs")?;
        let cache = CacheService::new(backend.store, policy);
        let invalidator = Invalidator::new(cache.clone());

        tracing::info!(
            max_pool_size = config.pool.max_size,
            cache_backend = cache.backend_name(),
            "storefront data layer ready"
        );

        Ok(Self {
            executor: QueryExecutor::new(pool),
            cache,
            invalidator,
            reaper,
            sweeper: backend.sweeper,
        })
    }

    /// Product list for a category (or all products), read through the cache.
    pub async fn catalog(
        &self,
        category: Option<&str>,
        page: storefront_cache::Page,
    ) -> Result<Value, DataStoreError> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("order", "name.asc".to_string()),
            ("offset", page.offset.to_string()),
            ("limit", page.limit.to_string()),
        ];
        if let Some(slug) = category {
            query.push(("category", format!("eq.{slug}")));
        }

        let executor = &self.executor;
        self.cache
            .with_policy(CacheKey::CatalogList { category, page }, async || {
                executor
                    .execute_query(async |client: &DataStoreClient| {
                        client.select("products", &query).await
                    })
                    .await
            })
            .await
    }

    /// Closes the pool and stops the background tasks.
    pub fn shutdown(self) {
        self.executor.close_all();
        self.reaper.abort();
        if let Some(sweeper) = self.sweeper {
            sweeper.abort();
        }
        tracing::info!("storefront data layer shut down");
    }
}
