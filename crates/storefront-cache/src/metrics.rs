//! Cache metrics emitted through the `metrics` facade.

use metrics::{counter, describe_counter, describe_gauge, gauge};

/// Metric names as constants for consistency.
pub mod names {
    pub const CACHE_HITS_TOTAL: &str = "cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "cache_misses_total";
    pub const CACHE_ENTRIES: &str = "cache_entries";
    pub const CACHE_STORE_ERRORS_TOTAL: &str = "cache_store_errors_total";
    pub const CACHE_KEYS_INVALIDATED_TOTAL: &str = "cache_keys_invalidated_total";
}

/// Register help text for every cache metric with the installed recorder.
pub fn describe_metrics() {
    describe_counter!(names::CACHE_HITS_TOTAL, "Reads answered from the cache");
    describe_counter!(names::CACHE_MISSES_TOTAL, "Reads that fell through to the data source");
    describe_gauge!(names::CACHE_ENTRIES, "Live keys per cache family");
    describe_counter!(names::CACHE_STORE_ERRORS_TOTAL, "Store failures absorbed by the cache layer");
    describe_counter!(names::CACHE_KEYS_INVALIDATED_TOTAL, "Keys removed by invalidation");
}

/// Record a cache hit.
pub fn record_cache_hit(backend: &str) {
    counter!(names::CACHE_HITS_TOTAL, "backend" => backend.to_string()).increment(1);
}

/// Record a cache miss.
pub fn record_cache_miss() {
    counter!(names::CACHE_MISSES_TOTAL).increment(1);
}

/// Record a store failure that was degraded to a miss or a dropped write.
pub fn record_store_error(operation: &'static str) {
    counter!(names::CACHE_STORE_ERRORS_TOTAL, "operation" => operation).increment(1);
}

pub fn record_invalidated(pattern: &str, removed: u64) {
    counter!(names::CACHE_KEYS_INVALIDATED_TOTAL, "pattern" => pattern.to_string())
        .increment(removed);
}

/// Set the number of live keys in a family.
pub fn set_cache_entries(family: &str, count: usize) {
    gauge!(names::CACHE_ENTRIES, "family" => family.to_string()).set(count as f64);
}
