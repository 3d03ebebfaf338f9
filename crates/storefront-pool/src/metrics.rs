//! Pool metrics emitted through the `metrics` facade.
//!
//! Nothing is recorded unless the host process installs a recorder.

use std::time::Duration;

use metrics::{Unit, counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

use crate::pool::PoolStats;

/// Metric names as constants for consistency.
pub mod names {
    pub const DB_POOL_CONNECTIONS_TOTAL: &str = "db_pool_connections_total";
    pub const DB_POOL_CONNECTIONS_IDLE: &str = "db_pool_connections_idle";
    pub const DB_POOL_CONNECTIONS_ACTIVE: &str = "db_pool_connections_active";
    pub const DB_POOL_ACQUIRE_DURATION_SECONDS: &str = "db_pool_acquire_duration_seconds";
    pub const DB_POOL_ACQUIRE_TIMEOUTS_TOTAL: &str = "db_pool_acquire_timeouts_total";
    pub const DB_POOL_FACTORY_FAILURES_TOTAL: &str = "db_pool_factory_failures_total";
    pub const DB_POOL_REAPED_TOTAL: &str = "db_pool_reaped_total";
}

/// Bucket bounds (seconds) for the acquire-wait histogram.
pub const ACQUIRE_DURATION_BUCKETS: &[f64] = &[0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0];

/// Register help text for every pool metric with the installed recorder.
pub fn describe_metrics() {
    describe_gauge!(names::DB_POOL_CONNECTIONS_TOTAL, "Pool members, idle and checked out");
    describe_gauge!(names::DB_POOL_CONNECTIONS_IDLE, "Pool members waiting to be reused");
    describe_gauge!(names::DB_POOL_CONNECTIONS_ACTIVE, "Pool members currently checked out");
    describe_histogram!(
        names::DB_POOL_ACQUIRE_DURATION_SECONDS,
        Unit::Seconds,
        "Time spent waiting for a pool member"
    );
    describe_counter!(names::DB_POOL_ACQUIRE_TIMEOUTS_TOTAL, "Acquires that gave up after max_wait_time");
    describe_counter!(names::DB_POOL_FACTORY_FAILURES_TOTAL, "Failed attempts to create a pool member");
    describe_counter!(names::DB_POOL_REAPED_TOTAL, "Idle members dropped by the reaper");
}

/// Record pool occupancy.
pub fn record_pool_stats(stats: &PoolStats) {
    gauge!(names::DB_POOL_CONNECTIONS_TOTAL).set(stats.total as f64);
    gauge!(names::DB_POOL_CONNECTIONS_IDLE).set(stats.idle as f64);
    gauge!(names::DB_POOL_CONNECTIONS_ACTIVE).set(stats.active as f64);
}

/// Record how long a successful acquire waited.
pub fn record_acquire_duration(duration: Duration) {
    histogram!(names::DB_POOL_ACQUIRE_DURATION_SECONDS).record(duration.as_secs_f64());
}

pub fn record_acquire_timeout() {
    counter!(names::DB_POOL_ACQUIRE_TIMEOUTS_TOTAL).increment(1);
}

pub fn record_factory_failure() {
    counter!(names::DB_POOL_FACTORY_FAILURES_TOTAL).increment(1);
}

pub fn record_reaped(count: usize) {
    counter!(names::DB_POOL_REAPED_TOTAL).increment(count as u64);
}
