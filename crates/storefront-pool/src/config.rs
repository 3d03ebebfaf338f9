//! Pool sizing and timing limits.

use std::time::Duration;

use crate::error::PoolError;

/// Limits applied by a [`ResourcePool`](crate::ResourcePool).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum number of members, idle and checked out combined.
    pub max_pool_size: usize,
    /// Idle members unused for longer than this are reaped.
    pub max_idle_time: Duration,
    /// Idle members older than this are reaped regardless of use.
    pub max_lifetime: Duration,
    /// How long `acquire` waits on a saturated pool before failing.
    pub max_wait_time: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_pool_size: 10,
            max_idle_time: Duration::from_secs(5 * 60),
            max_lifetime: Duration::from_secs(60 * 60),
            max_wait_time: Duration::from_secs(5),
        }
    }
}

impl PoolConfig {
    pub fn with_max_pool_size(mut self, max_pool_size: usize) -> Self {
        self.max_pool_size = max_pool_size;
        self
    }

    pub fn with_max_idle_time(mut self, max_idle_time: Duration) -> Self {
        self.max_idle_time = max_idle_time;
        self
    }

    pub fn with_max_lifetime(mut self, max_lifetime: Duration) -> Self {
        self.max_lifetime = max_lifetime;
        self
    }

    pub fn with_max_wait_time(mut self, max_wait_time: Duration) -> Self {
        self.max_wait_time = max_wait_time;
        self
    }

    /// Rejects limits the pool cannot operate under.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.max_pool_size == 0 {
            return Err(PoolError::invalid_config("max_pool_size must be > 0"));
        }
        if self.max_wait_time.is_zero() {
            return Err(PoolError::invalid_config("max_wait_time must be > 0"));
        }
        if self.max_idle_time.is_zero() || self.max_lifetime.is_zero() {
            return Err(PoolError::invalid_config(
                "max_idle_time and max_lifetime must be > 0",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.max_pool_size, 10);
        assert_eq!(config.max_idle_time, Duration::from_secs(300));
        assert_eq!(config.max_lifetime, Duration::from_secs(3600));
        assert_eq!(config.max_wait_time, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        assert!(PoolConfig::default().with_max_pool_size(0).validate().is_err());
        assert!(
            PoolConfig::default()
                .with_max_wait_time(Duration::ZERO)
                .validate()
                .is_err()
        );
        assert!(
            PoolConfig::default()
                .with_max_idle_time(Duration::ZERO)
                .validate()
                .is_err()
        );
    }
}
