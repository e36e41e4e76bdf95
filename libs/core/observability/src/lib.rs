//! Observability utilities for the cost estimation engine.
//!
//! This crate provides:
//! - Prometheus metrics recording and text exposition
//! - Metrics for index builds, cost estimates and recommendations
//!
//! # Example
//!
//! ```rust,ignore
//! use observability::{init_metrics, render_metrics, PricingMetrics};
//!
//! init_metrics();
//! PricingMetrics::record_index_build("us-east-1", "ready", 0.42);
//! println!("{}", render_metrics());
//! ```

pub mod pricing;

pub use pricing::PricingMetrics;

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::{info, warn};

static METRICS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Initialize the Prometheus metrics recorder.
///
/// Safe to call more than once; returns `None` when another global recorder
/// was installed first.
pub fn init_metrics() -> Option<&'static PrometheusHandle> {
    let result = METRICS_HANDLE.get_or_try_init(|| {
        let handle = PrometheusBuilder::new().install_recorder()?;
        info!("Prometheus metrics recorder initialized");
        register_metric_descriptions();
        Ok::<_, metrics_exporter_prometheus::BuildError>(handle)
    });

    match result {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Failed to install Prometheus recorder");
            None
        }
    }
}

/// Get the metrics handle (must call init_metrics first)
pub fn get_metrics_handle() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE.get()
}

/// Prometheus text exposition of everything recorded so far
pub fn render_metrics() -> String {
    match get_metrics_handle() {
        Some(handle) => handle.render(),
        None => "# Metrics not initialized\n".to_string(),
    }
}

/// Register metric descriptions for documentation
fn register_metric_descriptions() {
    use metrics::describe_counter;
    use metrics::describe_gauge;
    use metrics::describe_histogram;

    // Index build
    describe_counter!(
        "pricing_index_builds_total",
        "Pricing index builds by region and final status"
    );
    describe_histogram!(
        "pricing_index_build_duration_seconds",
        "Time spent loading and indexing the catalog"
    );
    describe_gauge!(
        "pricing_index_entries",
        "Catalog entries kept in the index, by service"
    );
    describe_counter!(
        "pricing_catalog_entries_total",
        "Catalog entries processed, by service and outcome"
    );

    // Estimation
    describe_counter!(
        "cost_estimates_total",
        "Cost estimate calls by kind, resource type and outcome"
    );
    describe_histogram!(
        "cost_estimate_duration_seconds",
        "Cost estimate latency in seconds"
    );
    describe_counter!(
        "pricing_lookup_misses_total",
        "Estimates answered with zero because no rate was indexed"
    );

    // Recommendations
    describe_counter!(
        "recommendations_generated_total",
        "Recommendations returned, by resource type"
    );
    describe_histogram!(
        "recommendation_savings_usd",
        "Monthly savings offered per recommendation request"
    );
    describe_counter!(
        "recommendations_dropped_total",
        "Recommendations discarded by validation"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let first = init_metrics().map(|h| h as *const PrometheusHandle);
        let second = init_metrics().map(|h| h as *const PrometheusHandle);
        assert_eq!(first, second);

        PricingMetrics::record_index_build("us-east-1", "ready", 0.1);
        if first.is_some() {
            assert!(render_metrics().contains("pricing_index_builds_total"));
        }
    }
}
