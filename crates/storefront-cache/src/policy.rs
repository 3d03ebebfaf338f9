//! Cache key templates and TTLs per resource kind.
//!
//! Read paths and invalidation paths both derive keys from here, so a key
//! written by [`CacheService::with_policy`](crate::CacheService::with_policy)
//! is always inside the family glob the [`Invalidator`](crate::Invalidator)
//! clears.
//!
//! | kind          | key                                         | family           |
//! |---------------|---------------------------------------------|------------------|
//! | catalog list  | `products:all`, `products:category:<slug>`  | `products:*`     |
//! | catalog item  | `products:item:<id>`                        | `products:item:*`|
//! | category list | `categories:all`                            | `categories:*`   |
//! | search        | `search:<term>`                             | `search:*`       |
//! | analytics     | `analytics:<type>:<period>`                 | `analytics:*`    |
//! | order stats   | `orders:stats:<period>`                     | `orders:stats:*` |
//! | user profile  | `user:<id>`                                 | `user:*`         |

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};
use crate::store::MAX_TTL;

/// Top-level family globs. Together they cover every key this crate writes.
pub const FAMILY_PATTERNS: [&str; 6] = [
    "products:*",
    "categories:*",
    "search:*",
    "analytics:*",
    "orders:stats:*",
    "user:*",
];

/// Logical resource kinds with their own key template and TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    CatalogList,
    CatalogItem,
    CategoryList,
    Search,
    Analytics,
    OrderStats,
    UserProfile,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 7] = [
        ResourceKind::CatalogList,
        ResourceKind::CatalogItem,
        ResourceKind::CategoryList,
        ResourceKind::Search,
        ResourceKind::Analytics,
        ResourceKind::OrderStats,
        ResourceKind::UserProfile,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::CatalogList => "catalog_list",
            ResourceKind::CatalogItem => "catalog_item",
            ResourceKind::CategoryList => "category_list",
            ResourceKind::Search => "search",
            ResourceKind::Analytics => "analytics",
            ResourceKind::OrderStats => "order_stats",
            ResourceKind::UserProfile => "user_profile",
        }
    }

    pub fn default_ttl(self) -> Duration {
        Duration::from_secs(match self {
            ResourceKind::CatalogList => 3600,
            ResourceKind::CatalogItem => 1800,
            ResourceKind::CategoryList => 7200,
            ResourceKind::Search => 900,
            ResourceKind::Analytics => 1800,
            ResourceKind::OrderStats => 600,
            ResourceKind::UserProfile => 300,
        })
    }

    /// Glob matching every key of this kind.
    pub fn family_pattern(self) -> &'static str {
        match self {
            ResourceKind::CatalogList => "products:*",
            ResourceKind::CatalogItem => "products:item:*",
            ResourceKind::CategoryList => "categories:*",
            ResourceKind::Search => "search:*",
            ResourceKind::Analytics => "analytics:*",
            ResourceKind::OrderStats => "orders:stats:*",
            ResourceKind::UserProfile => "user:*",
        }
    }

    /// Key for a single resource, for kinds addressed by id.
    pub fn key_for_id(self, id: &str) -> Option<String> {
        match self {
            ResourceKind::CatalogItem => Some(CacheKey::CatalogItem { id }.to_string()),
            ResourceKind::UserProfile => Some(CacheKey::UserProfile { id }.to_string()),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "catalog_list" | "catalog" | "products" => Ok(ResourceKind::CatalogList),
            "catalog_item" | "product" => Ok(ResourceKind::CatalogItem),
            "category_list" | "categories" => Ok(ResourceKind::CategoryList),
            "search" => Ok(ResourceKind::Search),
            "analytics" => Ok(ResourceKind::Analytics),
            "order_stats" | "orders" => Ok(ResourceKind::OrderStats),
            "user_profile" | "user" => Ok(ResourceKind::UserProfile),
            other => Err(format!("unknown resource kind '{other}'")),
        }
    }
}

/// A list page. The default page (offset 0, limit 20) keeps the bare key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: u32,
    pub limit: u32,
}

impl Page {
    pub const DEFAULT_LIMIT: u32 = 20;

    pub fn new(offset: u32, limit: u32) -> Self {
        Self { offset, limit }
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

/// A cache key for one resource, rendered through `Display`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKey<'a> {
    /// All products, optionally narrowed to one category.
    CatalogList {
        category: Option<&'a str>,
        page: Page,
    },
    CatalogItem {
        id: &'a str,
    },
    CategoryList,
    Search {
        term: &'a str,
        page: Page,
    },
    Analytics {
        report: &'a str,
        period: &'a str,
    },
    OrderStats {
        period: &'a str,
    },
    UserProfile {
        id: &'a str,
    },
}

impl CacheKey<'_> {
    pub fn kind(&self) -> ResourceKind {
        match self {
            CacheKey::CatalogList { .. } => ResourceKind::CatalogList,
            CacheKey::CatalogItem { .. } => ResourceKind::CatalogItem,
            CacheKey::CategoryList => ResourceKind::CategoryList,
            CacheKey::Search { .. } => ResourceKind::Search,
            CacheKey::Analytics { .. } => ResourceKind::Analytics,
            CacheKey::OrderStats { .. } => ResourceKind::OrderStats,
            CacheKey::UserProfile { .. } => ResourceKind::UserProfile,
        }
    }
}

impl fmt::Display for CacheKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let page = match self {
            CacheKey::CatalogList {
                category: None,
                page,
            } => {
                f.write_str("products:all")?;
                page
            }
            CacheKey::CatalogList {
                category: Some(slug),
                page,
            } => {
                write!(f, "products:category:{slug}")?;
                page
            }
            CacheKey::Search { term, page } => {
                write!(f, "search:{}", term.trim().to_lowercase())?;
                page
            }
            CacheKey::CatalogItem { id } => return write!(f, "products:item:{id}"),
            CacheKey::CategoryList => return f.write_str("categories:all"),
            CacheKey::Analytics { report, period } => {
                return write!(f, "analytics:{report}:{period}");
            }
            CacheKey::OrderStats { period } => return write!(f, "orders:stats:{period}"),
            CacheKey::UserProfile { id } => return write!(f, "user:{id}"),
        };
        if page.is_default() {
            Ok(())
        } else {
            write!(f, ":page:{}:{}", page.offset, page.limit)
        }
    }
}

/// TTL per resource kind: built-in defaults plus configured overrides.
///
/// Immutable once built; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct TtlPolicy {
    ttls: [Duration; ResourceKind::ALL.len()],
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            ttls: ResourceKind::ALL.map(ResourceKind::default_ttl),
        }
    }
}

impl TtlPolicy {
    /// Replaces the TTL for `kind`. Zero and anything above [`MAX_TTL`] are
    /// rejected.
    pub fn with_ttl(mut self, kind: ResourceKind, ttl: Duration) -> Result<Self> {
        if ttl.is_zero() || ttl > MAX_TTL {
            return Err(CacheError::invalid_ttl(kind.family_pattern()));
        }
        self.ttls[kind as usize] = ttl;
        Ok(self)
    }

    pub fn ttl(&self, kind: ResourceKind) -> Duration {
        self.ttls[kind as usize]
    }
}
