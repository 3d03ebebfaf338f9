//! Cache error types.
//!
//! Stores report failures honestly through [`CacheError`]; it is the
//! [`CacheService`](crate::CacheService) that decides to degrade them to a
//! miss or a dropped write.

use std::fmt;

/// Result type alias using [`CacheError`].
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors that can occur while talking to a cache store.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Could not obtain a connection to the store.
    #[error("Cache connection error: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// The store rejected or failed a command.
    #[error("Cache command failed: {0}")]
    Command(#[from] redis::RedisError),

    /// A payload could not be encoded or decoded.
    #[error("Cache payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Entries must be written with a TTL between 1 ms and `MAX_TTL`.
    #[error("Invalid TTL for cache key '{key}': TTL must be between 1 ms and 365 days")]
    InvalidTtl {
        /// The key that was being written.
        key: String,
    },

    /// A key glob could not be compiled.
    #[error("Invalid key pattern '{pattern}': {message}")]
    InvalidPattern {
        /// The offending glob.
        pattern: String,
        /// Why it was rejected.
        message: String,
    },
}

impl CacheError {
    /// Creates a new `Connection` error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidTtl` error.
    #[must_use]
    pub fn invalid_ttl(key: impl Into<String>) -> Self {
        Self::InvalidTtl { key: key.into() }
    }

    /// Creates a new `InvalidPattern` error.
    #[must_use]
    pub fn invalid_pattern(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            message: message.into(),
        }
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Connection { .. } | Self::Command(_) => ErrorCategory::Infrastructure,
            Self::Serialization(_) => ErrorCategory::Payload,
            Self::InvalidTtl { .. } | Self::InvalidPattern { .. } => ErrorCategory::Usage,
        }
    }
}

impl From<deadpool_redis::PoolError> for CacheError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        Self::connection(err.to_string())
    }
}

/// Categories of cache errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The store is unreachable or failing.
    Infrastructure,
    /// A stored payload does not match the expected shape.
    Payload,
    /// The caller passed something the store cannot accept.
    Usage,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Payload => write!(f, "payload"),
            Self::Usage => write!(f, "usage"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CacheError::connection("connection refused");
        assert_eq!(err.to_string(), "Cache connection error: connection refused");

        let err = CacheError::invalid_ttl("products:all");
        assert_eq!(
            err.to_string(),
            "Invalid TTL for cache key 'products:all': TTL must be between 1 ms and 365 days"
        );

        let err = CacheError::invalid_pattern("products:[", "unterminated character class");
        assert_eq!(
            err.to_string(),
            "Invalid key pattern 'products:[': unterminated character class"
        );
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            CacheError::connection("down").category(),
            ErrorCategory::Infrastructure
        );
        assert_eq!(
            CacheError::invalid_ttl("k").category(),
            ErrorCategory::Usage
        );
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        assert_eq!(
            CacheError::from(json_err).category(),
            ErrorCategory::Payload
        );
        assert_eq!(ErrorCategory::Payload.to_string(), "payload");
    }
}
