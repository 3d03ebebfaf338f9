//! # storefront-pool
//!
//! Bounded pool of reusable handles to the primary data store, plus a
//! scoped-execution facade that guarantees every checkout is returned.
//!
//! ## Overview
//!
//! - [`ResourcePool`] owns at most `max_pool_size` members created lazily by a
//!   [`ConnectionFactory`]. Saturated callers wait up to `max_wait_time` and
//!   then fail with [`PoolError::ResourceTimeout`].
//! - [`QueryExecutor`] runs async closures against a checked-out handle and
//!   releases it on every exit path.
//! - [`ResourcePool::spawn_reaper`] periodically drops idle members past
//!   `max_idle_time` or `max_lifetime`.
//!
//! ## Example
//!
//! ```ignore
//! use storefront_pool::{PoolConfig, QueryExecutor, ResourcePool, factory_fn};
//!
//! let pool = ResourcePool::new(factory_fn(|| async { Ok(Client::connect().await?) }), PoolConfig::default())?;
//! let _reaper = pool.spawn_reaper(Duration::from_secs(60));
//! let executor = QueryExecutor::new(pool);
//!
//! let rows = executor
//!     .execute_query(async |client: &Client| client.select("products").await)
//!     .await?;
//! ```

mod config;
mod error;
mod executor;
mod factory;
pub mod metrics;
mod pool;
mod reaper;

pub use config::PoolConfig;
pub use error::{BoxError, ErrorCategory, PoolError, Result};
pub use executor::QueryExecutor;
pub use factory::{ConnectionFactory, FnFactory, factory_fn};
pub use pool::{PoolStats, PooledConnection, ResourcePool};
