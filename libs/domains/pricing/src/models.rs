use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, EnumString};

use crate::carbon::CarbonFootprint;

/// Hours in a billing month (365 * 24 / 12)
pub const HOURS_PER_MONTH: f64 = 730.0;

/// Cloud provider enumeration
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default, Hash,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum CloudProvider {
    #[default]
    Aws,
    Azure,
    Gcp,
}

/// Currency enumeration
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default, Hash,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Usd,
}

/// Canonical resource types the estimator has a formula for
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, Hash,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ResourceKind {
    Ec2,
    Ebs,
    Rds,
    S3,
    Lambda,
    #[strum(to_string = "dynamodb")]
    #[serde(rename = "dynamodb")]
    DynamoDb,
    Eks,
    Elb,
}

impl ResourceKind {
    /// Recognize a resource type string.
    ///
    /// Accepts the short canonical names (`ec2`, `ebs`, ...), a few common
    /// synonyms, and Pulumi-style type tokens such as `aws:ec2/instance:Instance`
    /// where the module segment decides.
    pub fn detect(resource_type: &str) -> Option<Self> {
        let lowered = resource_type.trim().to_ascii_lowercase();
        let token = match lowered.strip_prefix("aws:") {
            Some(rest) => rest.split(['/', ':']).next().unwrap_or_default(),
            None => lowered.as_str(),
        };

        let kind = match token {
            "ec2" | "instance" => ResourceKind::Ec2,
            "ebs" | "volume" => ResourceKind::Ebs,
            "rds" | "db" => ResourceKind::Rds,
            "s3" | "bucket" => ResourceKind::S3,
            "lambda" | "function" => ResourceKind::Lambda,
            "dynamodb" | "table" => ResourceKind::DynamoDb,
            "eks" | "cluster" => ResourceKind::Eks,
            "elb" | "alb" | "nlb" | "lb" | "elasticloadbalancing" | "elasticloadbalancingv2"
            | "loadbalancer" => ResourceKind::Elb,
            _ => return None,
        };
        Some(kind)
    }
}

/// Lambda CPU architecture
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default, Hash,
)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum LambdaArchitecture {
    #[default]
    #[strum(to_string = "x86_64", serialize = "x86", serialize = "amd64")]
    X86_64,
    #[strum(to_string = "arm64", serialize = "arm", serialize = "aarch64")]
    Arm64,
}

/// Load balancer class
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default, Hash,
)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum LoadBalancerClass {
    #[default]
    #[strum(to_string = "application", serialize = "alb")]
    Application,
    #[strum(to_string = "network", serialize = "nlb")]
    Network,
}

impl LoadBalancerClass {
    /// Name of the per-hour capacity unit billed for this class.
    pub fn capacity_unit(&self) -> &'static str {
        match self {
            LoadBalancerClass::Application => "LCU",
            LoadBalancerClass::Network => "NLCU",
        }
    }
}

/// EKS control plane support tier
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default, Hash,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum EksSupportTier {
    #[default]
    Standard,
    Extended,
}

/// DynamoDB rates for one region; each field is `None` when the catalog lacked it
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DynamoDbRates {
    /// $ per on-demand read request unit
    pub on_demand_read: Option<f64>,
    /// $ per on-demand write request unit
    pub on_demand_write: Option<f64>,
    /// $ per GB-month of table storage
    pub storage_per_gb_month: Option<f64>,
    /// $ per provisioned RCU-hour
    pub provisioned_rcu_hourly: Option<f64>,
    /// $ per provisioned WCU-hour
    pub provisioned_wcu_hourly: Option<f64>,
}

/// Lambda rates for one architecture
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LambdaRates {
    /// $ per request
    pub request: Option<f64>,
    /// $ per GB-second of duration
    pub gb_second: Option<f64>,
}

/// Load balancer rates for one class
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LoadBalancerRates {
    /// $ per load-balancer hour
    pub fixed_hourly: Option<f64>,
    /// $ per capacity unit (LCU / NLCU) hour
    pub capacity_unit_hourly: Option<f64>,
}

/// Canonical identification of a priceable resource
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    #[serde(default)]
    pub provider: String,
    #[serde(default, alias = "resourceType", alias = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl ResourceDescriptor {
    pub fn new(
        provider: impl Into<String>,
        resource_type: impl Into<String>,
        sku: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            resource_type: resource_type.into(),
            sku: sku.into(),
            region: region.into(),
            tags: HashMap::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Names of identifying fields that are blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("provider", &self.provider),
            ("resource_type", &self.resource_type),
            ("sku", &self.sku),
            ("region", &self.region),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// True when no identifying field is set.
    pub(crate) fn is_blank(&self) -> bool {
        self.missing_fields().len() == 4
    }
}

/// Caller input in any of the supported identification shapes
///
/// Resolution order: `descriptor`, then `arn` (+ SKU from `tags`), then a JSON
/// descriptor inside `resource_id`, then the flat `tags` map.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceInput {
    #[serde(default)]
    pub descriptor: Option<ResourceDescriptor>,
    #[serde(default)]
    pub arn: Option<String>,
    #[serde(default, alias = "resourceId")]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl ResourceInput {
    pub fn from_descriptor(descriptor: ResourceDescriptor) -> Self {
        Self {
            descriptor: Some(descriptor),
            ..Default::default()
        }
    }

    pub fn from_arn(arn: impl Into<String>, tags: HashMap<String, String>) -> Self {
        Self {
            arn: Some(arn.into()),
            tags,
            ..Default::default()
        }
    }

    pub fn from_resource_id(resource_id: impl Into<String>, tags: HashMap<String, String>) -> Self {
        Self {
            resource_id: Some(resource_id.into()),
            tags,
            ..Default::default()
        }
    }

    pub fn from_tags(tags: HashMap<String, String>) -> Self {
        Self {
            tags,
            ..Default::default()
        }
    }
}

/// Where a cost figure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, Default)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CostSource {
    /// Steady-state monthly projection from list prices
    #[default]
    Projected,
    /// Projection pro-rated over a time window
    Derived,
}

/// Cost answer for one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    /// Monthly cost, or the windowed cost for actual-cost queries
    pub cost: f64,
    pub currency: Currency,
    /// Human-readable derivation, including any defaults that were applied
    pub billing_detail: String,
    pub source: CostSource,
    /// Runtime covered by a windowed estimate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_hours: Option<f64>,
    /// Emissions over the same period, for instance types with power data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carbon: Option<CarbonFootprint>,
}

impl CostEstimate {
    pub fn projected(cost: f64, billing_detail: impl Into<String>) -> Self {
        Self {
            cost,
            currency: Currency::Usd,
            billing_detail: billing_detail.into(),
            source: CostSource::Projected,
            usage_hours: None,
            carbon: None,
        }
    }

    pub fn with_carbon(mut self, carbon: Option<CarbonFootprint>) -> Self {
        self.carbon = carbon;
        self
    }
}
