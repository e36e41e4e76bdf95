//! Cost-reduction recommendations.
//!
//! Three heuristics ride on the same indices as the estimator:
//!
//! - generation upgrade: older EC2 family to its newer drop-in successor
//! - Graviton migration: x86 EC2 family to its ARM counterpart
//! - gp2 to gp3 for EBS volumes
//!
//! A candidate is only offered when its rate is not higher than the current
//! one, and every recommendation is validated before it leaves the engine.

use observability::PricingMetrics;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use strum::{Display, EnumString};
use tracing::{debug, warn};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::client::PriceLookup;
use crate::error::{PricingError, PricingResult};
use crate::models::{CloudProvider, Currency, HOURS_PER_MONTH, ResourceKind};
use crate::tags;

pub const CONFIDENCE_HIGH: f64 = 0.9;
pub const CONFIDENCE_MEDIUM: f64 = 0.7;
pub const RECOMMENDATION_SOURCE: &str = "aws-public";
pub const PROJECTION_PERIOD: &str = "monthly";
/// Volume size assumed when no size tag is present
pub const DEFAULT_VOLUME_SIZE_GB: f64 = 100.0;

const BASELINE_PLATFORM: &str = "Linux";
const BASELINE_TENANCY: &str = "Shared";

/// Older family to its newer same-architecture successor
const GENERATION_UPGRADES: &[(&str, &str)] = &[
    ("t2", "t3"),
    ("m4", "m5"),
    ("m5", "m6i"),
    ("c4", "c5"),
    ("c5", "c6i"),
    ("r4", "r5"),
    ("r5", "r6i"),
    ("i3", "i4i"),
    ("d2", "d3"),
];

/// x86 family to its Graviton counterpart
const GRAVITON_MIGRATIONS: &[(&str, &str)] = &[
    ("t3", "t4g"),
    ("t3a", "t4g"),
    ("m5", "m6g"),
    ("c5", "c6g"),
    ("r5", "r6g"),
    ("m6i", "m7g"),
    ("c6i", "c7g"),
    ("r6i", "r7g"),
];

fn mapped(table: &[(&str, &'static str)], family: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(from, _)| *from == family)
        .map(|(_, to)| *to)
}

/// Split `m5.large` into family and size
fn parse_instance_type(instance_type: &str) -> Option<(&str, &str)> {
    instance_type
        .trim()
        .split_once('.')
        .filter(|(family, size)| !family.is_empty() && !size.is_empty())
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecommendationCategory {
    Cost,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecommendationAction {
    Modify,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModificationType {
    GenerationUpgrade,
    GravitonMigration,
    VolumeTypeUpgrade,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RecommendationPriority {
    Low,
    Medium,
    High,
}

/// Recommendation request
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecommendationRequest {
    #[serde(alias = "resourceType")]
    pub resource_type: String,
    pub sku: String,
    /// Empty means the client's region
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl RecommendationRequest {
    pub fn new(resource_type: impl Into<String>, sku: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            sku: sku.into(),
            ..Default::default()
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// The resource a recommendation applies to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct RecommendedResource {
    #[validate(length(min = 1))]
    pub provider: String,
    #[validate(length(min = 1))]
    pub resource_type: String,
    #[validate(length(min = 1))]
    pub region: String,
    #[validate(length(min = 1))]
    pub sku: String,
}

/// Monthly cost impact of applying a recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_impact"))]
pub struct RecommendationImpact {
    pub estimated_savings: f64,
    pub current_cost: f64,
    pub projected_cost: f64,
    pub savings_percent: f64,
    pub currency: Currency,
    #[validate(length(min = 1))]
    pub projection_period: String,
}

impl RecommendationImpact {
    /// Savings of `projected` against `current`; percent is zero on a zero base.
    pub fn monthly(current_cost: f64, projected_cost: f64) -> Self {
        let estimated_savings = current_cost - projected_cost;
        let savings_percent = if current_cost > 0.0 {
            estimated_savings / current_cost * 100.0
        } else {
            0.0
        };

        Self {
            estimated_savings,
            current_cost,
            projected_cost,
            savings_percent,
            currency: Currency::Usd,
            projection_period: PROJECTION_PERIOD.to_string(),
        }
    }
}

fn validate_impact(impact: &RecommendationImpact) -> Result<(), ValidationError> {
    let values = [
        impact.estimated_savings,
        impact.current_cost,
        impact.projected_cost,
        impact.savings_percent,
    ];
    if values.iter().any(|v| !v.is_finite()) {
        return Err(ValidationError::new("non_finite_cost"));
    }
    if impact.current_cost < 0.0 || impact.projected_cost < 0.0 {
        return Err(ValidationError::new("negative_cost"));
    }
    if impact.projected_cost > impact.current_cost {
        return Err(ValidationError::new("more_expensive_alternative"));
    }
    Ok(())
}

/// One proposed modification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Recommendation {
    pub id: Uuid,
    pub category: RecommendationCategory,
    pub action: RecommendationAction,
    pub modification_type: ModificationType,
    #[validate(nested)]
    pub resource: RecommendedResource,
    #[validate(length(min = 1))]
    pub current_config: BTreeMap<String, String>,
    #[validate(length(min = 1))]
    pub recommended_config: BTreeMap<String, String>,
    #[validate(nested)]
    pub impact: RecommendationImpact,
    pub priority: RecommendationPriority,
    #[validate(range(min = 0.0, max = 1.0))]
    pub confidence_score: f64,
    #[validate(length(min = 1))]
    pub description: String,
    #[validate(length(min = 1))]
    pub reasoning: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    pub source: String,
}

/// Aggregate over one response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationSummary {
    pub total_recommendations: usize,
    pub total_estimated_savings: f64,
    pub currency: Currency,
    pub projection_period: String,
    pub count_by_category: BTreeMap<RecommendationCategory, usize>,
    pub savings_by_category: BTreeMap<RecommendationCategory, f64>,
    pub count_by_action: BTreeMap<RecommendationAction, usize>,
}

impl RecommendationSummary {
    pub fn from_recommendations(recommendations: &[Recommendation]) -> Self {
        let mut summary = Self {
            total_recommendations: recommendations.len(),
            total_estimated_savings: 0.0,
            currency: Currency::Usd,
            projection_period: PROJECTION_PERIOD.to_string(),
            count_by_category: BTreeMap::new(),
            savings_by_category: BTreeMap::new(),
            count_by_action: BTreeMap::new(),
        };

        for rec in recommendations {
            let savings = rec.impact.estimated_savings;
            summary.total_estimated_savings += savings;
            *summary.count_by_category.entry(rec.category).or_default() += 1;
            *summary.savings_by_category.entry(rec.category).or_default() += savings;
            *summary.count_by_action.entry(rec.action).or_default() += 1;
        }
        summary
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub recommendations: Vec<Recommendation>,
    pub summary: RecommendationSummary,
}

impl RecommendationResponse {
    fn new(recommendations: Vec<Recommendation>) -> Self {
        let summary = RecommendationSummary::from_recommendations(&recommendations);
        Self {
            recommendations,
            summary,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

/// Fields shared by every heuristic
struct Draft {
    modification_type: ModificationType,
    resource_type: ResourceKind,
    sku: String,
    current_config: BTreeMap<String, String>,
    recommended_config: BTreeMap<String, String>,
    impact: RecommendationImpact,
    priority: RecommendationPriority,
    confidence_score: f64,
    description: String,
    reasoning: Vec<String>,
    metadata: BTreeMap<String, String>,
}

fn config(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Recommendation engine over a shared price lookup
pub struct RecommendationEngine<P: PriceLookup> {
    pricing: Arc<P>,
}

impl<P: PriceLookup> RecommendationEngine<P> {
    pub fn new(pricing: Arc<P>) -> Self {
        Self { pricing }
    }

    /// Validated recommendations for one resource; no sku means none.
    pub fn recommend(&self, request: &RecommendationRequest) -> PricingResult<RecommendationResponse> {
        let started = Instant::now();
        let sku = request.sku.trim();
        if sku.is_empty() {
            debug!(resource_type = %request.resource_type, "No sku supplied, nothing to recommend");
            return Ok(RecommendationResponse::empty());
        }

        let client_region = self.pricing.region();
        let region = match request.region.trim() {
            "" => client_region.clone(),
            region if region.eq_ignore_ascii_case(&client_region) => client_region.clone(),
            region => {
                return Err(PricingError::RegionMismatch {
                    client_region,
                    resource_region: region.to_string(),
                });
            }
        };

        self.pricing.ensure_ready()?;

        let drafts: Vec<Draft> = match ResourceKind::detect(&request.resource_type) {
            Some(ResourceKind::Ec2) => [self.generation_upgrade(sku), self.graviton_migration(sku)]
                .into_iter()
                .flatten()
                .collect(),
            Some(ResourceKind::Ebs) => self.volume_upgrade(sku, &request.tags).into_iter().collect(),
            _ => {
                debug!(resource_type = %request.resource_type, "No heuristics for resource type");
                Vec::new()
            }
        };

        let recommendations: Vec<Recommendation> = drafts
            .into_iter()
            .map(|draft| finish(draft, &region))
            .filter(|rec| match rec.validate() {
                Ok(()) => true,
                Err(e) => {
                    warn!(
                        modification_type = %rec.modification_type,
                        sku = %rec.resource.sku,
                        error = %e,
                        "Dropping invalid recommendation"
                    );
                    PricingMetrics::record_recommendation_dropped(&rec.modification_type.to_string());
                    false
                }
            })
            .collect();

        let response = RecommendationResponse::new(recommendations);
        PricingMetrics::record_recommendations(
            &request.resource_type,
            response.summary.total_recommendations,
            response.summary.total_estimated_savings,
        );
        debug!(
            sku = sku,
            count = response.summary.total_recommendations,
            savings = response.summary.total_estimated_savings,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Recommendations generated"
        );
        Ok(response)
    }

    /// Current and candidate hourly rates, when the candidate is not pricier.
    fn gated_ec2_rates(&self, current: &str, candidate: &str) -> Option<(f64, f64)> {
        let current_rate =
            self.pricing
                .ec2_on_demand_hourly(current, BASELINE_PLATFORM, BASELINE_TENANCY)?;
        let candidate_rate =
            self.pricing
                .ec2_on_demand_hourly(candidate, BASELINE_PLATFORM, BASELINE_TENANCY)?;
        if candidate_rate > current_rate {
            debug!(current, candidate, current_rate, candidate_rate, "Candidate is more expensive");
            return None;
        }
        Some((current_rate, candidate_rate))
    }

    fn generation_upgrade(&self, instance_type: &str) -> Option<Draft> {
        let (family, size) = parse_instance_type(instance_type)?;
        let newer = mapped(GENERATION_UPGRADES, family)?;
        let new_type = format!("{newer}.{size}");
        let (current_rate, new_rate) = self.gated_ec2_rates(instance_type, &new_type)?;

        let mut reasoning = vec![
            format!("Newer {newer} instances offer better performance"),
            "Drop-in replacement with no architecture changes required".to_string(),
        ];
        if let Some(arm) = mapped(GRAVITON_MIGRATIONS, newer) {
            reasoning.push(format!(
                "Alternative: consider {arm}.{size} (Graviton) for ARM compatibility and additional savings"
            ));
        }

        Some(Draft {
            modification_type: ModificationType::GenerationUpgrade,
            resource_type: ResourceKind::Ec2,
            sku: instance_type.to_string(),
            current_config: config(&[("instance_type", instance_type)]),
            recommended_config: config(&[("instance_type", &new_type)]),
            impact: RecommendationImpact::monthly(
                current_rate * HOURS_PER_MONTH,
                new_rate * HOURS_PER_MONTH,
            ),
            priority: RecommendationPriority::Medium,
            confidence_score: CONFIDENCE_HIGH,
            description: format!(
                "Upgrade from {instance_type} to {new_type} for better performance at same or lower cost"
            ),
            reasoning,
            metadata: BTreeMap::new(),
        })
    }

    fn graviton_migration(&self, instance_type: &str) -> Option<Draft> {
        let (family, size) = parse_instance_type(instance_type)?;
        let arm = mapped(GRAVITON_MIGRATIONS, family)?;
        let arm_type = format!("{arm}.{size}");
        let (current_rate, arm_rate) = self.gated_ec2_rates(instance_type, &arm_type)?;
        let impact =
            RecommendationImpact::monthly(current_rate * HOURS_PER_MONTH, arm_rate * HOURS_PER_MONTH);

        Some(Draft {
            modification_type: ModificationType::GravitonMigration,
            resource_type: ResourceKind::Ec2,
            sku: instance_type.to_string(),
            current_config: config(&[("instance_type", instance_type), ("architecture", "x86_64")]),
            recommended_config: config(&[("instance_type", &arm_type), ("architecture", "arm64")]),
            description: format!(
                "Migrate from {instance_type} to {arm_type} (Graviton) for ~{:.0}% cost savings",
                impact.savings_percent
            ),
            impact,
            priority: RecommendationPriority::Low,
            confidence_score: CONFIDENCE_MEDIUM,
            reasoning: vec![
                "Graviton instances are typically cheaper with comparable performance".to_string(),
                "Requires validation that the application supports ARM architecture".to_string(),
            ],
            metadata: config(&[
                ("architecture_change", "x86_64 -> arm64"),
                ("requires_validation", "Application must support ARM architecture"),
            ]),
        })
    }

    fn volume_upgrade(&self, volume_type: &str, tags: &HashMap<String, String>) -> Option<Draft> {
        if !volume_type.eq_ignore_ascii_case("gp2") {
            return None;
        }

        let size = tags::usage(tags, &["size", "volume_size"], DEFAULT_VOLUME_SIZE_GB);
        // A zero-sized volume has nothing to save.
        let size_gb = if size.value > 0.0 {
            size.value
        } else {
            DEFAULT_VOLUME_SIZE_GB
        };

        let gp2_rate = self.pricing.ebs_monthly_per_gb("gp2")?;
        let gp3_rate = self.pricing.ebs_monthly_per_gb("gp3")?;
        if gp3_rate > gp2_rate {
            return None;
        }

        let impact = RecommendationImpact::monthly(gp2_rate * size_gb, gp3_rate * size_gb);
        let size_label = size_gb.to_string();

        Some(Draft {
            modification_type: ModificationType::VolumeTypeUpgrade,
            resource_type: ResourceKind::Ebs,
            sku: volume_type.to_string(),
            current_config: config(&[("volume_type", "gp2"), ("size_gb", &size_label)]),
            recommended_config: config(&[("volume_type", "gp3"), ("size_gb", &size_label)]),
            description: format!(
                "Upgrade {size_label}GB gp2 volume to gp3 for ~{:.0}% cost savings",
                impact.savings_percent
            ),
            impact,
            priority: RecommendationPriority::Medium,
            confidence_score: CONFIDENCE_HIGH,
            reasoning: vec![
                "gp3 volumes cost less per GB than gp2".to_string(),
                "gp3 provides better baseline performance (3000 IOPS, 125 MB/s)".to_string(),
                "API-compatible change with no data migration required".to_string(),
            ],
            metadata: config(&[
                ("baseline_iops", "gp2: 100 IOPS/GB, gp3: 3000 IOPS (included)"),
                ("baseline_throughput", "gp2: 128-250 MB/s, gp3: 125 MB/s (included)"),
            ]),
        })
    }
}

fn finish(draft: Draft, region: &str) -> Recommendation {
    Recommendation {
        id: Uuid::new_v4(),
        category: RecommendationCategory::Cost,
        action: RecommendationAction::Modify,
        modification_type: draft.modification_type,
        resource: RecommendedResource {
            provider: CloudProvider::Aws.to_string(),
            resource_type: draft.resource_type.to_string(),
            region: region.to_string(),
            sku: draft.sku,
        },
        current_config: draft.current_config,
        recommended_config: draft.recommended_config,
        impact: draft.impact,
        priority: draft.priority,
        confidence_score: draft.confidence_score,
        description: draft.description,
        reasoning: draft.reasoning,
        metadata: draft.metadata,
        source: RECOMMENDATION_SOURCE.to_string(),
    }
}
