//! Prometheus exporter for the pool and cache metrics.
//!
//! The pool and cache crates record through the `metrics` facade; this module
//! installs the recorder they report into and renders its contents.

use std::sync::OnceLock;

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use storefront_pool::metrics::{ACQUIRE_DURATION_BUCKETS, names::DB_POOL_ACQUIRE_DURATION_SECONDS};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full(DB_POOL_ACQUIRE_DURATION_SECONDS.to_string()),
        ACQUIRE_DURATION_BUCKETS,
    )
}

/// Install the process-wide recorder and describe the pool and cache metrics.
///
/// Returns `false` when a recorder was already installed or installation
/// failed; recording then goes nowhere but nothing else breaks.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        return false;
    }

    let handle = match builder().and_then(PrometheusBuilder::install_recorder) {
        Ok(handle) => handle,
        Err(e) => {
            tracing::warn!(error = %e, "metrics recorder not installed");
            return false;
        }
    };
    if PROMETHEUS_HANDLE.set(handle).is_err() {
        return false;
    }

    storefront_pool::metrics::describe_metrics();
    storefront_cache::metrics::describe_metrics();
    tracing::debug!("Prometheus metrics initialized");
    true
}

/// Current metrics in Prometheus text format, if the recorder is installed.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(PrometheusHandle::render)
}
