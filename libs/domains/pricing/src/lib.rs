//! Pricing Domain
//!
//! Answers "what does this cloud resource cost?" from the public AWS Price List
//! catalog: the catalog is indexed once per region, caller input is resolved to
//! a canonical descriptor, and per-resource-type formulas price it. EC2
//! estimates also carry a carbon footprint when power data for the instance
//! type is known (see [`carbon`]).
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────────┐
//! │  Estimator   │   │ RecommendationEngine │  ← Cost formulas, heuristics
//! └──────┬───────┘   └──────────┬───────────┘
//!        │  IdentityResolver    │              ← descriptor / ARN / tags
//! ┌──────▼──────────────────────▼───────────┐
//! │        PriceLookup (PricingClient)       │  ← Lazy exactly-once build
//! └──────────────────┬──────────────────────┘
//!                    │
//! ┌──────────────────▼──────────────────────┐
//! │  IndexBuilder → PricingIndices           │  ← Filter, normalize, key
//! └──────────────────┬──────────────────────┘
//!                    │
//! ┌──────────────────▼──────────────────────┐
//! │  RawCatalog (Price List JSON)            │  ← CatalogSource
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_pricing::{CostEstimator, PricingClient, ResourceDescriptor};
//! use std::sync::Arc;
//!
//! let client = Arc::new(PricingClient::from_paths("us-east-1", vec!["ec2.json".into()]));
//! let estimator = CostEstimator::new(client);
//! let estimate = estimator
//!     .projected_cost_for(&ResourceDescriptor::new("aws", "ec2", "t3.micro", "us-east-1"))?;
//! ```

pub mod arn;
pub mod carbon;
pub mod catalog;
pub mod client;
pub mod error;
pub mod estimator;
pub mod identity;
pub mod index;
pub mod models;
pub mod recommendations;
pub mod tags;

// Re-export commonly used types
pub use arn::{ParsedResourceIdentifier, Partition};
pub use carbon::{CarbonFootprint, InstanceSpec};
pub use catalog::{RawCatalog, RawCatalogEntry, ServiceCode};
pub use client::{
    BuildPhase, BytesCatalogSource, CatalogSource, ClientStatus, FileCatalogSource, PriceLookup,
    PricingClient,
};
pub use error::{PricingError, PricingResult};
pub use estimator::{CostEstimator, runtime_hours};
pub use identity::IdentityResolver;
pub use index::{IndexBuilder, IndexStats, PricingIndex, PricingIndices, build_indices};
pub use models::{
    CloudProvider, CostEstimate, CostSource, Currency, DynamoDbRates, EksSupportTier,
    HOURS_PER_MONTH, LambdaArchitecture, LambdaRates, LoadBalancerClass, LoadBalancerRates,
    ResourceDescriptor, ResourceInput, ResourceKind,
};
pub use recommendations::{
    ModificationType, Recommendation, RecommendationAction, RecommendationCategory,
    RecommendationEngine, RecommendationImpact, RecommendationPriority, RecommendationRequest,
    RecommendationResponse, RecommendationSummary,
};
