//! Error types for the connection pool.
//!
//! Pool-structural failures (timeouts, factory failures) are the caller's
//! problem: they are surfaced to the request boundary and never retried here.

use std::fmt;
use std::time::Duration;

/// Result type alias using [`PoolError`].
pub type Result<T> = std::result::Result<T, PoolError>;

/// Boxed error produced by a connection factory.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while acquiring or managing pooled connections.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// No handle became available within the configured wait time.
    #[error(
        "Resource timeout: no pooled connection available after {waited:?} (max pool size {max_pool_size})"
    )]
    ResourceTimeout {
        /// How long the caller waited before giving up.
        waited: Duration,
        /// Capacity of the saturated pool.
        max_pool_size: usize,
    },

    /// The connection factory failed to produce a handle.
    #[error("Connection factory failed: {source}")]
    FactoryFailure {
        /// The underlying factory error.
        #[source]
        source: BoxError,
    },

    /// The pool has been closed and hands out no more connections.
    #[error("Connection pool is closed")]
    Closed,

    /// The pool configuration is unusable.
    #[error("Invalid pool configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },
}

impl PoolError {
    /// Creates a new `FactoryFailure` error.
    #[must_use]
    pub fn factory_failure(source: impl Into<BoxError>) -> Self {
        Self::FactoryFailure {
            source: source.into(),
        }
    }

    /// Creates a new `InvalidConfig` error.
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns `true` if this is an acquire timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ResourceTimeout { .. })
    }

    /// Returns `true` if the factory failed.
    #[must_use]
    pub fn is_factory_failure(&self) -> bool {
        matches!(self, Self::FactoryFailure { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ResourceTimeout { .. } => ErrorCategory::Saturated,
            Self::FactoryFailure { .. } => ErrorCategory::Infrastructure,
            Self::Closed => ErrorCategory::Shutdown,
            Self::InvalidConfig { .. } => ErrorCategory::Configuration,
        }
    }
}

/// Categories of pool errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The pool is at capacity; callers should shed load.
    Saturated,
    /// The backend could not be reached.
    Infrastructure,
    /// The pool is shutting down.
    Shutdown,
    /// Misconfiguration.
    Configuration,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Saturated => write!(f, "saturated"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Shutdown => write!(f, "shutdown"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PoolError::ResourceTimeout {
            waited: Duration::from_millis(100),
            max_pool_size: 1,
        };
        assert_eq!(
            err.to_string(),
            "Resource timeout: no pooled connection available after 100ms (max pool size 1)"
        );

        let err = PoolError::factory_failure("connection refused");
        assert_eq!(
            err.to_string(),
            "Connection factory failed: connection refused"
        );

        assert_eq!(PoolError::Closed.to_string(), "Connection pool is closed");
    }

    #[test]
    fn test_error_predicates() {
        let err = PoolError::ResourceTimeout {
            waited: Duration::from_secs(5),
            max_pool_size: 10,
        };
        assert!(err.is_timeout());
        assert!(!err.is_factory_failure());

        let err = PoolError::factory_failure("boom");
        assert!(err.is_factory_failure());
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            PoolError::factory_failure("boom").category(),
            ErrorCategory::Infrastructure
        );
        assert_eq!(PoolError::Closed.category(), ErrorCategory::Shutdown);
        assert_eq!(
            PoolError::invalid_config("max_pool_size must be > 0").category(),
            ErrorCategory::Configuration
        );
        assert_eq!(ErrorCategory::Saturated.to_string(), "saturated");
    }
}
