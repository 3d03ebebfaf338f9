//! Cache-aside layer for storefront reads.
//!
//! - [`CacheStore`]: key-value store with TTLs and glob enumeration, backed by
//!   Redis ([`RedisStore`]) or an in-process map ([`MemoryStore`]).
//! - [`policy`]: key templates and default TTLs per [`ResourceKind`].
//! - [`CacheService`]: typed, fail-open `with_cache` orchestration.
//! - [`Invalidator`]: single-key, family and webhook-driven invalidation.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use storefront_cache::{CacheKey, CacheService, MemoryStore, TtlPolicy};
//! # async fn run() -> Result<(), std::io::Error> {
//! let cache = CacheService::new(Arc::new(MemoryStore::new()), TtlPolicy::default());
//! let stats: u64 = cache
//!     .with_policy(CacheKey::OrderStats { period: "week" }, async || Ok::<_, std::io::Error>(42))
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod glob;
mod invalidation;
mod memory;
pub mod metrics;
pub mod policy;
mod redis_store;
mod service;
mod store;

pub use error::{CacheError, ErrorCategory, Result};
pub use glob::KeyPattern;
pub use invalidation::{EventKind, InvalidationEvent, Invalidator, WebhookOutcome};
pub use memory::MemoryStore;
pub use policy::{CacheKey, FAMILY_PATTERNS, Page, ResourceKind, TtlPolicy};
pub use redis_store::RedisStore;
pub use service::CacheService;
pub use store::{CacheStore, MAX_TTL};
