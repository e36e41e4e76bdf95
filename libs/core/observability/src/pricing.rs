//! Metrics for the pricing index and cost estimation engine.

use metrics::{counter, gauge, histogram};

/// Pricing metrics recorder
pub struct PricingMetrics;

impl PricingMetrics {
    // =========================================================================
    // Index Build Metrics
    // =========================================================================

    /// Record the ingestion counters of one service after an index build
    pub fn record_index_service(service: &str, kept: usize, filtered: usize, malformed: usize) {
        let service = service.to_string();
        gauge!("pricing_index_entries", "service" => service.clone()).set(kept as f64);
        counter!("pricing_catalog_entries_total", "service" => service.clone(), "outcome" => "kept")
            .increment(kept as u64);
        counter!("pricing_catalog_entries_total", "service" => service.clone(), "outcome" => "filtered")
            .increment(filtered as u64);
        counter!("pricing_catalog_entries_total", "service" => service, "outcome" => "malformed")
            .increment(malformed as u64);
    }

    /// Record a finished index build
    pub fn record_index_build(region: &str, status: &str, duration_secs: f64) {
        counter!(
            "pricing_index_builds_total",
            "region" => region.to_string(),
            "status" => status.to_string()
        )
        .increment(1);
        histogram!("pricing_index_build_duration_seconds", "region" => region.to_string())
            .record(duration_secs);

        tracing::debug!(
            region = region,
            status = status,
            duration_secs = duration_secs,
            "Recorded index build"
        );
    }

    // =========================================================================
    // Estimation Metrics
    // =========================================================================

    /// Record a cost estimate call
    pub fn record_estimate(kind: &str, resource_type: &str, outcome: &str, duration_secs: f64) {
        counter!(
            "cost_estimates_total",
            "kind" => kind.to_string(),
            "resource_type" => resource_type.to_string(),
            "outcome" => outcome.to_string()
        )
        .increment(1);
        histogram!("cost_estimate_duration_seconds", "kind" => kind.to_string())
            .record(duration_secs);
    }

    /// Record a lookup that found no rate
    pub fn record_price_miss(resource_type: &str) {
        counter!("pricing_lookup_misses_total", "resource_type" => resource_type.to_string())
            .increment(1);
    }

    // =========================================================================
    // Recommendation Metrics
    // =========================================================================

    /// Record the output of one recommendation request
    pub fn record_recommendations(resource_type: &str, count: usize, monthly_savings: f64) {
        counter!("recommendations_generated_total", "resource_type" => resource_type.to_string())
            .increment(count as u64);
        histogram!("recommendation_savings_usd", "resource_type" => resource_type.to_string())
            .record(monthly_savings);

        tracing::debug!(
            resource_type = resource_type,
            count = count,
            monthly_savings = monthly_savings,
            "Recorded recommendations"
        );
    }

    /// Record a recommendation dropped by validation
    pub fn record_recommendation_dropped(modification_type: &str) {
        counter!(
            "recommendations_dropped_total",
            "modification_type" => modification_type.to_string()
        )
        .increment(1);
    }
}
