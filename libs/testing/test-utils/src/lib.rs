//! Shared test utilities for the pricing crates
//!
//! This crate provides reusable test infrastructure:
//! - `catalog::CatalogBuilder`: synthetic AWS Price List documents
//! - `catalog::us_east_1_catalog`: combined fixture with known reference prices
//! - `assertions`: Custom assertion helpers
//!
//! # Usage
//!
//! ```rust,ignore
//! use test_utils::catalog::{us_east_1_catalog, reference};
//! use domain_pricing::PricingClient;
//!
//! let client = PricingClient::from_bytes("us-east-1", us_east_1_catalog().to_bytes());
//! assert_eq!(client.indices()?.ec2_on_demand_hourly("t3.micro", "Linux", "Shared"),
//!            Some(reference::T3_MICRO_LINUX));
//! ```

pub mod catalog;

/// Test assertion helpers
pub mod assertions {
    /// Default tolerance for money comparisons
    pub const EPSILON: f64 = 1e-9;

    /// Assert two floats are within `EPSILON` with a nice error message
    pub fn assert_close(actual: f64, expected: f64, context: &str) {
        assert!(
            (actual - expected).abs() < EPSILON,
            "{}: expected {}, got {} (diff {})",
            context,
            expected,
            actual,
            (actual - expected).abs()
        );
    }

    /// Assert that an optional value is Some
    pub fn assert_some<T>(value: Option<T>, context: &str) -> T {
        value.unwrap_or_else(|| panic!("{}: expected Some, got None", context))
    }
}
