use serde::{Deserialize, Serialize};
use std::time::Duration;
use storefront_cache::{CacheError, MAX_TTL, ResourceKind, TtlPolicy};
use storefront_pool::PoolConfig;

const REDACTED: &str = "<redacted>";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub pool: PoolSettings,
    /// Redis configuration
    #[serde(default)]
    pub redis: RedisConfig,
    /// Per-kind cache TTLs
    #[serde(default)]
    pub cache: CacheConfig,
    /// Primary data store connection
    #[serde(default)]
    pub datastore: DataStoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Pool validations
        if self.pool.max_size == 0 {
            return Err("pool.max_size must be > 0".into());
        }
        if self.pool.max_wait_time_ms == 0 {
            return Err("pool.max_wait_time_ms must be > 0".into());
        }
        if self.pool.max_idle_time_ms == 0 {
            return Err("pool.max_idle_time_ms must be > 0".into());
        }
        if self.pool.max_lifetime_ms == 0 {
            return Err("pool.max_lifetime_ms must be > 0".into());
        }
        if self.pool.reap_interval_ms == 0 {
            return Err("pool.reap_interval_ms must be > 0".into());
        }
        // Redis validations
        if self.redis.enabled {
            if self.redis.url.is_empty() {
                return Err("redis.enabled=true requires redis.url".into());
            }
            if self.redis.pool_size == 0 {
                return Err("redis.pool_size must be > 0".into());
            }
            if self.redis.timeout_ms == 0 {
                return Err("redis.timeout_ms must be > 0".into());
            }
        }
        // Cache validations
        for kind in ResourceKind::ALL {
            let secs = self.cache.ttl_secs(kind);
            if secs == 0 {
                return Err(format!("cache.{kind}_ttl_secs must be > 0"));
            }
            if secs > MAX_TTL.as_secs() {
                return Err(format!(
                    "cache.{kind}_ttl_secs must be <= {}",
                    MAX_TTL.as_secs()
                ));
            }
        }
        if self.cache.sweep_interval_secs == 0 {
            return Err("cache.sweep_interval_secs must be > 0".into());
        }
        // Data store validation
        if let Err(e) = url::Url::parse(&self.datastore.url) {
            return Err(format!("datastore.url is not a valid URL: {e}"));
        }
        if self.datastore.timeout_ms == 0 {
            return Err("datastore.timeout_ms must be > 0".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }

    /// Copy safe to print: the service key and any password in the Redis URL
    /// are replaced with `<redacted>`.
    pub fn redacted(&self) -> AppConfig {
        let mut shown = self.clone();
        if shown.datastore.service_key.is_some() {
            shown.datastore.service_key = Some(REDACTED.to_string());
        }
        if let Ok(mut url) = url::Url::parse(&shown.redis.url)
            && url.password().is_some()
            && url.set_password(Some(REDACTED)).is_ok()
        {
            shown.redis.url = url.into();
        }
        shown
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig::default()
            .with_max_pool_size(self.pool.max_size)
            .with_max_idle_time(Duration::from_millis(self.pool.max_idle_time_ms))
            .with_max_lifetime(Duration::from_millis(self.pool.max_lifetime_ms))
            .with_max_wait_time(Duration::from_millis(self.pool.max_wait_time_ms))
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_millis(self.pool.reap_interval_ms)
    }

    pub fn ttl_policy(&self) -> Result<TtlPolicy, CacheError> {
        ResourceKind::ALL
            .into_iter()
            .try_fold(TtlPolicy::default(), |policy, kind| {
                policy.with_ttl(kind, Duration::from_secs(self.cache.ttl_secs(kind)))
            })
    }
}

/// Connection pool settings for the primary data store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSettings {
    #[serde(default = "default_pool_max_size")]
    pub max_size: usize,
    /// Idle members older than this are reaped
    #[serde(default = "default_pool_max_idle_time_ms")]
    pub max_idle_time_ms: u64,
    /// Idle members created longer ago than this are reaped
    #[serde(default = "default_pool_max_lifetime_ms")]
    pub max_lifetime_ms: u64,
    /// How long `acquire` waits on a saturated pool
    #[serde(default = "default_pool_max_wait_time_ms")]
    pub max_wait_time_ms: u64,
    /// Background reaper period
    #[serde(default = "default_pool_reap_interval_ms")]
    pub reap_interval_ms: u64,
}

fn default_pool_max_size() -> usize {
    10
}

fn default_pool_max_idle_time_ms() -> u64 {
    300_000 // 5 minutes
}

fn default_pool_max_lifetime_ms() -> u64 {
    3_600_000 // 1 hour
}

fn default_pool_max_wait_time_ms() -> u64 {
    5000
}

fn default_pool_reap_interval_ms() -> u64 {
    60_000
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_size: default_pool_max_size(),
            max_idle_time_ms: default_pool_max_idle_time_ms(),
            max_lifetime_ms: default_pool_max_lifetime_ms(),
            max_wait_time_ms: default_pool_max_wait_time_ms(),
            reap_interval_ms: default_pool_reap_interval_ms(),
        }
    }
}

/// Redis configuration for the shared cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Enable Redis (gracefully degrades to an in-process cache without it)
    /// Default: false
    #[serde(default = "default_redis_enabled")]
    pub enabled: bool,

    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Connection timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,

    /// Prefix added to every key, e.g. "staging:"
    #[serde(default)]
    pub namespace: Option<String>,
}

fn default_redis_enabled() -> bool {
    false
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    5000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: default_redis_enabled(),
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
            namespace: None,
        }
    }
}

/// Cache TTLs in seconds, one per resource kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_catalog_list_ttl_secs")]
    pub catalog_list_ttl_secs: u64,
    #[serde(default = "default_catalog_item_ttl_secs")]
    pub catalog_item_ttl_secs: u64,
    #[serde(default = "default_category_list_ttl_secs")]
    pub category_list_ttl_secs: u64,
    #[serde(default = "default_search_ttl_secs")]
    pub search_ttl_secs: u64,
    #[serde(default = "default_analytics_ttl_secs")]
    pub analytics_ttl_secs: u64,
    #[serde(default = "default_order_stats_ttl_secs")]
    pub order_stats_ttl_secs: u64,
    #[serde(default = "default_user_profile_ttl_secs")]
    pub user_profile_ttl_secs: u64,
    /// How often the in-process store purges expired entries
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_catalog_list_ttl_secs() -> u64 {
    ResourceKind::CatalogList.default_ttl().as_secs()
}

fn default_catalog_item_ttl_secs() -> u64 {
    ResourceKind::CatalogItem.default_ttl().as_secs()
}

fn default_category_list_ttl_secs() -> u64 {
    ResourceKind::CategoryList.default_ttl().as_secs()
}

fn default_search_ttl_secs() -> u64 {
    ResourceKind::Search.default_ttl().as_secs()
}

fn default_analytics_ttl_secs() -> u64 {
    ResourceKind::Analytics.default_ttl().as_secs()
}

fn default_order_stats_ttl_secs() -> u64 {
    ResourceKind::OrderStats.default_ttl().as_secs()
}

fn default_user_profile_ttl_secs() -> u64 {
    ResourceKind::UserProfile.default_ttl().as_secs()
}

impl CacheConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn ttl_secs(&self, kind: ResourceKind) -> u64 {
        match kind {
            ResourceKind::CatalogList => self.catalog_list_ttl_secs,
            ResourceKind::CatalogItem => self.catalog_item_ttl_secs,
            ResourceKind::CategoryList => self.category_list_ttl_secs,
            ResourceKind::Search => self.search_ttl_secs,
            ResourceKind::Analytics => self.analytics_ttl_secs,
            ResourceKind::OrderStats => self.order_stats_ttl_secs,
            ResourceKind::UserProfile => self.user_profile_ttl_secs,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            catalog_list_ttl_secs: default_catalog_list_ttl_secs(),
            catalog_item_ttl_secs: default_catalog_item_ttl_secs(),
            category_list_ttl_secs: default_category_list_ttl_secs(),
            search_ttl_secs: default_search_ttl_secs(),
            analytics_ttl_secs: default_analytics_ttl_secs(),
            order_stats_ttl_secs: default_order_stats_ttl_secs(),
            user_profile_ttl_secs: default_user_profile_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

/// REST data store behind the connection pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataStoreConfig {
    /// Base URL, e.g. "https://project.example.co"
    #[serde(default = "default_datastore_url")]
    pub url: String,

    /// Service key sent as `apikey` and bearer token
    #[serde(default)]
    pub service_key: Option<String>,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_datastore_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_datastore_url() -> String {
    "http://localhost:54321".to_string()
}

fn default_datastore_timeout_ms() -> u64 {
    10_000
}

impl Default for DataStoreConfig {
    fn default() -> Self {
        Self {
            url: default_datastore_url(),
            service_key: None,
            timeout_ms: default_datastore_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub const DEFAULT_CONFIG_PATH: &str = "storefront.toml";

    /// Loads the optional TOML file, then `STOREFRONT__*` environment
    /// overrides (e.g. `STOREFRONT__POOL__MAX_SIZE=20`), then validates.
    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
        let mut builder = Config::builder();
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        builder = builder.add_source(
            Environment::with_prefix("STOREFRONT")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
