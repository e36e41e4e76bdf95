//! Integration tests for the pricing domain
//!
//! These tests drive the public API against a synthetic us-east-1 price list:
//! - Catalog decoding and index build through `PricingClient`
//! - Identity resolution for every input shape
//! - Projected and windowed cost formulas per resource type
//! - Recommendation heuristics and their price gate

use chrono::{Duration, TimeZone, Utc};
use domain_pricing::*;
use std::collections::HashMap;
use std::sync::Arc;
use test_utils::assertions::*;
use test_utils::catalog::{CatalogBuilder, reference, us_east_1_catalog};

fn client() -> Arc<PricingClient> {
    Arc::new(PricingClient::from_bytes(
        "us-east-1",
        us_east_1_catalog().to_bytes(),
    ))
}

fn estimator() -> CostEstimator<PricingClient> {
    CostEstimator::new(client())
}

fn aws(resource_type: &str, sku: &str) -> ResourceDescriptor {
    ResourceDescriptor::new("aws", resource_type, sku, "us-east-1")
}

fn tags(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn projected(descriptor: &ResourceDescriptor) -> CostEstimate {
    estimator()
        .projected_cost_for(descriptor)
        .unwrap_or_else(|e| panic!("estimate for {descriptor:?} failed: {e}"))
}

// ============================================================================
// Client Tests
// ============================================================================

#[test]
fn test_index_build_filters_catalog_noise() {
    let client = client();
    let indices = client.indices().unwrap();

    assert_eq!(
        indices.ec2_on_demand_hourly("t3.micro", "Linux", "Shared"),
        Some(reference::T3_MICRO_LINUX)
    );
    // Lookups are case-insensitive on every key part
    assert_eq!(
        indices.ec2_on_demand_hourly("T3.MICRO", "linux", "shared"),
        Some(reference::T3_MICRO_LINUX)
    );
    assert_eq!(
        indices.ec2_on_demand_hourly("t3.micro", "Windows", "Shared"),
        Some(reference::T3_MICRO_WINDOWS)
    );
    assert_eq!(indices.rds_instance_hourly("db.t3.micro", "MySQL", "Multi-AZ"), None);
    assert_eq!(indices.s3_monthly_per_gb("Standard"), Some(reference::S3_STANDARD_GB_MONTH));

    let status = client.status();
    assert_eq!(status.phase, BuildPhase::Ready);
    assert!(status.services.contains_key("AmazonEC2"));
    assert!(status.services["AmazonEC2"].filtered >= 4);
    assert!(status.services.contains_key("unrouted"));
}

#[test]
fn test_repeated_lookups_are_identical() {
    let client = client();
    let first = client.ec2_on_demand_hourly("m5.large", "Linux", "Shared");
    for _ in 0..10 {
        assert_eq!(client.ec2_on_demand_hourly("m5.large", "Linux", "Shared"), first);
    }
    assert_eq!(first, Some(reference::M5_LARGE_LINUX));
}

#[test]
fn test_missing_catalog_is_initialization_error() {
    let client = Arc::new(PricingClient::from_paths(
        "us-east-1",
        vec!["/nonexistent/pricing.json".into()],
    ));
    let estimator = CostEstimator::new(client);

    let err = estimator.projected_cost_for(&aws("ec2", "t3.micro")).unwrap_err();
    assert!(matches!(err, PricingError::Initialization(_)));
    assert!(!err.is_client_error());
}

// ============================================================================
// Projected Cost Tests
// ============================================================================

#[test]
fn test_ec2_reference_price() {
    let estimate = projected(&aws("ec2", "t3.micro"));
    assert_close(estimate.cost, 7.592, "t3.micro monthly");
    assert_eq!(estimate.currency, Currency::Usd);

    let windows = projected(&aws("ec2", "t3.micro").with_tag("platform", "windows"));
    assert_close(windows.cost, reference::T3_MICRO_WINDOWS * HOURS_PER_MONTH, "windows");

    let pulumi = projected(&aws("aws:ec2/instance:Instance", "t3.small"));
    assert_close(pulumi.cost, reference::T3_SMALL_LINUX * HOURS_PER_MONTH, "pulumi token");
}

#[test]
fn test_storage_formulas() {
    let ebs = projected(&aws("ebs", "gp3").with_tag("size", "100"));
    assert_close(ebs.cost, 8.0, "gp3 100GB");

    let s3 = projected(&aws("s3", "STANDARD").with_tag("size_gb", "100"));
    assert_close(s3.cost, 2.3, "s3 standard 100GB");

    let no_size = projected(&aws("s3", "STANDARD"));
    assert_eq!(no_size.cost, 0.0);
    assert!(no_size.billing_detail.contains("size_gb=0 (default, not supplied)"));
}

#[test]
fn test_rds_instance_plus_storage() {
    let mysql = projected(&aws("rds", "db.t3.micro").with_tag("engine", "mysql"));
    assert_close(
        mysql.cost,
        reference::RDS_T3_MICRO_MYSQL * HOURS_PER_MONTH + reference::RDS_GP2_GB_MONTH * 20.0,
        "mysql with default storage",
    );
    assert!(mysql.billing_detail.contains("allocated_storage_gb=20"));

    // gp3 storage is only priced under the engine-agnostic row
    let postgres = projected(
        &aws("rds", "db.t3.micro")
            .with_tag("engine", "postgres")
            .with_tag("storage_type", "gp3")
            .with_tag("allocated_storage", "50"),
    );
    assert_close(postgres.cost, 0.018 * HOURS_PER_MONTH + 0.115 * 50.0, "postgres gp3");
}

#[test]
fn test_lambda_requests_and_duration() {
    let estimate = projected(
        &aws("lambda", "my-function")
            .with_tag("requests_per_month", "1000000")
            .with_tag("avg_duration_ms", "100")
            .with_tag("memory_mb", "128"),
    );
    let gb_seconds = 1_000_000.0 * 0.1 * (128.0 / 1024.0);
    assert_close(
        estimate.cost,
        1_000_000.0 * reference::LAMBDA_REQUEST + gb_seconds * reference::LAMBDA_GB_SECOND,
        "lambda",
    );
}

#[test]
fn test_dynamodb_billing_modes() {
    let on_demand = projected(
        &aws("dynamodb", "on-demand")
            .with_tag("read_requests_per_month", "1000000")
            .with_tag("write_requests_per_month", "1000000")
            .with_tag("storage_gb", "10"),
    );
    assert_close(on_demand.cost, 0.25 + 1.25 + 2.5, "on-demand table");

    let provisioned = projected(
        &aws("dynamodb", "provisioned")
            .with_tag("read_capacity_units", "10")
            .with_tag("write_capacity_units", "5"),
    );
    assert_close(
        provisioned.cost,
        (10.0 * reference::DYNAMODB_RCU_HOURLY + 5.0 * reference::DYNAMODB_WCU_HOURLY)
            * HOURS_PER_MONTH,
        "provisioned table",
    );
}

#[test]
fn test_eks_support_tiers() {
    assert_close(projected(&aws("eks", "cluster")).cost, 73.0, "standard");
    let extended = projected(&aws("eks", "cluster").with_tag("support_type", "extended"));
    assert_close(extended.cost, 438.0, "extended");
}

#[test]
fn test_load_balancer_reference_price() {
    let alb = projected(&aws("elb", "alb").with_tag("lcu_per_hour", "5"));
    assert_close(alb.cost, 45.625, "alb with 5 LCU");

    let nlb = projected(&aws("nlb", "network").with_tag("capacity_units", "2"));
    assert_close(nlb.cost, 0.0225 * 730.0 + 0.006 * 2.0 * 730.0, "nlb generic capacity tag");

    let named = projected(&aws("nlb", "internal-api").with_tag("nlcu_per_hour", "2"));
    assert_close(
        named.cost,
        (reference::NLB_HOURLY + reference::NLB_NLCU_HOURLY * 2.0) * HOURS_PER_MONTH,
        "nlb resource type with a free-form name",
    );

    let idle = projected(&aws("elb", "alb"));
    assert_close(idle.cost, reference::ALB_HOURLY * HOURS_PER_MONTH, "idle alb");
}

#[test]
fn test_unknown_sku_is_zero_with_explanation() {
    let estimate = projected(&aws("ec2", "x9.enormous"));
    assert_eq!(estimate.cost, 0.0);
    assert!(estimate.billing_detail.contains("not found in pricing data"));
}

#[test]
fn test_unsupported_type_is_an_error() {
    let err = estimator().projected_cost_for(&aws("sqs", "standard")).unwrap_err();
    assert_eq!(err, PricingError::UnsupportedResourceType("sqs".into()));
    assert!(err.is_client_error());
}

// ============================================================================
// Identity Resolution Tests
// ============================================================================

#[test]
fn test_arn_input_prices_like_descriptor() {
    let input = ResourceInput::from_arn(
        "arn:aws:ec2:us-east-1:123456789012:instance/i-0abc",
        tags(&[("instanceType", "t3.micro")]),
    );
    let estimate = estimator().projected_cost(&input).unwrap();
    assert_close(estimate.cost, 7.592, "arn t3.micro");
}

#[test]
fn test_global_arn_uses_client_region() {
    let parsed = ParsedResourceIdentifier::parse("arn:aws:s3:::my-bucket").unwrap();
    assert_eq!(parsed.region, "");

    let input = ResourceInput::from_arn(
        "arn:aws:s3:::my-bucket",
        tags(&[("sku", "STANDARD"), ("size_gb", "100")]),
    );
    let estimate = estimator().projected_cost(&input).unwrap();
    assert_close(estimate.cost, 2.3, "bucket");
}

#[test]
fn test_isolated_partition_rejected() {
    let input = ResourceInput::from_arn(
        "arn:aws-iso:ec2:us-iso-east-1:123456789012:instance/i-1",
        tags(&[("sku", "t3.micro")]),
    );
    let err = estimator().projected_cost(&input).unwrap_err();
    assert!(matches!(err, PricingError::InvalidIdentifier { .. }));
}

#[test]
fn test_empty_resource_segment_rejected() {
    let err = ParsedResourceIdentifier::parse("arn:aws:ec2:us-east-1:123456789012:").unwrap_err();
    assert!(err.to_string().contains("resource is empty"));
}

#[test]
fn test_tag_map_input() {
    let input = ResourceInput::from_tags(tags(&[
        ("provider", "aws"),
        ("resource_type", "ebs"),
        ("sku", "gp2"),
        ("region", "us-east-1"),
        ("volume_size", "50"),
    ]));
    let estimate = estimator().projected_cost(&input).unwrap();
    assert_close(estimate.cost, reference::GP2_GB_MONTH * 50.0, "gp2 50GB");
}

#[test]
fn test_other_region_is_mismatch() {
    let err = estimator()
        .projected_cost_for(&ResourceDescriptor::new("aws", "ec2", "t3.micro", "eu-west-1"))
        .unwrap_err();
    assert!(matches!(err, PricingError::RegionMismatch { .. }));
}

// ============================================================================
// Actual Cost Tests
// ============================================================================

#[test]
fn test_windowed_cost_is_pro_rated() {
    let start = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
    let end = start + Duration::hours(12);

    let estimate = estimator()
        .actual_cost_for(&aws("ec2", "t3.micro"), start, end)
        .unwrap();
    assert_close(estimate.cost, 7.592 * 12.0 / 730.0, "12 hours of t3.micro");
    assert_eq!(estimate.source, CostSource::Derived);
    assert!(estimate.billing_detail.contains("approximation"));

    let full_month = estimator()
        .actual_cost_for(&aws("ec2", "t3.micro"), start, start + Duration::hours(730))
        .unwrap();
    assert_close(full_month.cost, 7.592, "730 hours equals the projection");
}

#[test]
fn test_reversed_window_is_rejected() {
    let start = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
    let err = estimator()
        .actual_cost(
            &ResourceInput::from_descriptor(aws("ec2", "t3.micro")),
            start,
            start - Duration::minutes(5),
        )
        .unwrap_err();
    assert!(matches!(err, PricingError::InvalidTimeRange { .. }));
}

// ============================================================================
// Recommendation Tests
// ============================================================================

#[test]
fn test_recommendations_from_fixture() {
    let engine = RecommendationEngine::new(client());

    let m5 = engine.recommend(&RecommendationRequest::new("ec2", "m5.large")).unwrap();
    let kinds: Vec<_> = m5.recommendations.iter().map(|r| r.modification_type).collect();
    assert_eq!(
        kinds,
        vec![ModificationType::GenerationUpgrade, ModificationType::GravitonMigration]
    );
    assert_close(
        m5.summary.total_estimated_savings,
        (reference::M5_LARGE_LINUX - reference::M6G_LARGE_LINUX) * HOURS_PER_MONTH,
        "m5 savings",
    );

    let gp2 = engine
        .recommend(&RecommendationRequest::new("ebs", "gp2").with_tag("size", "200"))
        .unwrap();
    assert_eq!(gp2.recommendations.len(), 1);
    assert_close(gp2.recommendations[0].impact.estimated_savings, 4.0, "gp2 200GB");

    let none = engine.recommend(&RecommendationRequest::new("rds", "db.t3.micro")).unwrap();
    assert!(none.recommendations.is_empty());
}

#[test]
fn test_recommendation_price_gate() {
    let catalog = CatalogBuilder::new("AmazonEC2")
        .ec2_instance("t2.micro", "Linux", "Shared", 0.0116)
        .ec2_instance("t3.micro", "Linux", "Shared", 0.0200)
        .to_bytes();
    let engine = RecommendationEngine::new(Arc::new(PricingClient::from_bytes(
        "us-east-1",
        catalog,
    )));

    let response = engine
        .recommend(&RecommendationRequest::new("ec2", "t2.micro"))
        .unwrap();
    assert!(response.recommendations.is_empty());
}

#[test]
fn test_recommendation_response_serializes() {
    let engine = RecommendationEngine::new(client());
    let response = engine
        .recommend(&RecommendationRequest::new("ec2", "t3.micro"))
        .unwrap();

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["recommendations"][0]["modification_type"], "graviton_migration");
    assert_eq!(json["recommendations"][0]["priority"], "low");
    assert_eq!(json["summary"]["count_by_category"]["cost"], 1);
    assert_eq!(json["summary"]["currency"], "USD");
}
