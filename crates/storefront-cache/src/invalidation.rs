//! Targeted, family-wide and event-driven cache invalidation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::policy::{FAMILY_PATTERNS, ResourceKind};
use crate::service::CacheService;

/// A content-change notification, as posted by the catalog backend.
///
/// ```json
/// { "type": "product", "id": "42" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl InvalidationEvent {
    pub fn new(kind: impl Into<String>, id: Option<String>) -> Self {
        Self {
            kind: kind.into(),
            id,
        }
    }
}

/// Event types the invalidator acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Product,
    Category,
    All,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Product => "product",
            EventKind::Category => "category",
            EventKind::All => "all",
        }
    }

    /// Globs cleared for this event.
    ///
    /// Search results embed product rows and category pages embed category
    /// metadata, so both ride along with their source family.
    pub fn patterns(self) -> &'static [&'static str] {
        match self {
            EventKind::Product => &["products:*", "search:*"],
            EventKind::Category => &["categories:*", "products:category:*"],
            EventKind::All => &FAMILY_PATTERNS,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "product" => Ok(EventKind::Product),
            "category" => Ok(EventKind::Category),
            "all" => Ok(EventKind::All),
            other => Err(format!("unknown invalidation type '{other}'")),
        }
    }
}

/// Result of handling one [`InvalidationEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookOutcome {
    /// `false` only when the event type was not recognized.
    pub success: bool,
    /// The event type as received.
    pub invalidated: String,
    /// Number of cache entries removed.
    pub removed: u64,
}

/// Removes cache entries when the underlying data changes.
#[derive(Debug, Clone)]
pub struct Invalidator {
    cache: CacheService,
}

impl Invalidator {
    pub fn new(cache: CacheService) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &CacheService {
        &self.cache
    }

    /// Removes the entry for `id` when `kind` is addressed by id, otherwise
    /// the whole family of `kind`. Returns the number of entries removed.
    ///
    /// Dropping a single catalog item does not touch the list keys that may
    /// embed it; list-changing mutations go through [`handle_webhook`].
    ///
    /// [`handle_webhook`]: Self::handle_webhook
    pub async fn invalidate(&self, kind: ResourceKind, id: Option<&str>) -> u64 {
        let removed = match id.and_then(|id| kind.key_for_id(id)) {
            Some(key) => u64::from(self.cache.del(&key).await),
            None => self.cache.clear_pattern(kind.family_pattern()).await,
        };
        info!(kind = %kind, id = ?id, removed, "cache invalidated");
        removed
    }

    /// Clears every family. Returns the total removed.
    pub async fn invalidate_all(&self) -> u64 {
        let removed = self.clear_all(&FAMILY_PATTERNS).await;
        info!(removed, "entire cache invalidated");
        removed
    }

    /// Maps a change event to the families it affects and clears them.
    ///
    /// Unknown event types are logged and ignored.
    pub async fn handle_webhook(&self, event: &InvalidationEvent) -> WebhookOutcome {
        let kind = match event.kind.parse::<EventKind>() {
            Ok(kind) => kind,
            Err(e) => {
                warn!(event_type = %event.kind, id = ?event.id, error = %e, "ignoring invalidation event");
                return WebhookOutcome {
                    success: false,
                    invalidated: event.kind.clone(),
                    removed: 0,
                };
            }
        };

        let removed = match kind {
            EventKind::All => self.invalidate_all().await,
            _ => self.clear_all(kind.patterns()).await,
        };
        info!(event_type = %kind, id = ?event.id, removed, "invalidation event handled");

        WebhookOutcome {
            success: true,
            invalidated: event.kind.clone(),
            removed,
        }
    }

    async fn clear_all(&self, patterns: &[&str]) -> u64 {
        let mut removed = 0;
        for pattern in patterns {
            removed += self.cache.clear_pattern(pattern).await;
        }
        removed
    }
}
