//! Subcommand implementations; each returns a serializable result.

use chrono::{DateTime, Utc};
use core_config::pricing::PricingConfig;
use domain_pricing::{
    ClientStatus, CostEstimate, CostEstimator, ParsedResourceIdentifier, PricingClient,
    RecommendationEngine, RecommendationRequest, RecommendationResponse, ResourceDescriptor,
    ResourceInput,
};
use eyre::{Result, WrapErr, eyre};
use serde::Serialize;
use serde_json::Value;
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, info};

/// Keys that mark a bare descriptor rather than a `ResourceInput` envelope
const DESCRIPTOR_KEYS: &[&str] = &["provider", "resource_type", "resourceType", "type", "sku", "region"];

/// Estimator and recommender sharing one lazily built client
pub struct App {
    client: Arc<PricingClient>,
    estimator: CostEstimator<PricingClient>,
    recommender: RecommendationEngine<PricingClient>,
}

impl App {
    pub fn new(config: &PricingConfig) -> Result<Self> {
        config
            .validate()
            .wrap_err("a price list is required: set PRICING_CATALOG_PATH or pass --catalog")?;

        info!(
            region = %config.region,
            catalogs = config.catalog_paths.len(),
            "Creating pricing client"
        );
        let client = Arc::new(PricingClient::from_paths(
            config.region.clone(),
            config.catalog_paths.clone(),
        ));
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Arc<PricingClient>) -> Self {
        Self {
            estimator: CostEstimator::new(Arc::clone(&client)),
            recommender: RecommendationEngine::new(Arc::clone(&client)),
            client,
        }
    }

    /// Caller-level utilization for carbon estimates.
    pub fn with_utilization(mut self, utilization: Option<f64>) -> Self {
        if let Some(utilization) = utilization {
            self.estimator = self.estimator.with_utilization(utilization);
        }
        self
    }

    /// Build the index and report per-service counts.
    pub fn status(&self) -> Result<ClientStatus> {
        let warmed = self.client.warm();
        let status = self.client.status();
        warmed.wrap_err_with(|| format!("index build failed for {}", status.source))?;
        Ok(status)
    }

    pub fn estimate(&self, input: &ResourceInput) -> Result<CostEstimate> {
        self.estimator
            .projected_cost(input)
            .wrap_err("projected cost estimate failed")
    }

    pub fn actual(
        &self,
        input: &ResourceInput,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<CostEstimate> {
        self.estimator
            .actual_cost(input, start, end)
            .wrap_err("actual cost estimate failed")
    }

    pub fn recommend(&self, request: &RecommendationRequest) -> Result<RecommendationResponse> {
        self.recommender
            .recommend(request)
            .wrap_err("recommendation failed")
    }
}

/// Parsed ARN plus what the estimator would make of it
#[derive(Debug, Serialize)]
pub struct ArnReport {
    #[serde(flatten)]
    pub parsed: ParsedResourceIdentifier,
    pub canonical_resource_type: String,
    pub global_service: bool,
}

pub fn parse_arn(arn: &str) -> Result<ArnReport> {
    let parsed = ParsedResourceIdentifier::parse(arn)?;
    Ok(ArnReport {
        canonical_resource_type: parsed.canonical_resource_type(),
        global_service: parsed.is_global_service(),
        parsed,
    })
}

/// Read a resource from a file, or stdin when `path` is `-`.
pub fn read_input(path: &str) -> Result<ResourceInput> {
    let raw = if path == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .wrap_err("failed to read resource from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path).wrap_err_with(|| format!("failed to read {path}"))?
    };
    parse_input(&raw)
}

/// Accept either a `ResourceInput` envelope or a bare descriptor object.
pub fn parse_input(raw: &str) -> Result<ResourceInput> {
    let value: Value = serde_json::from_str(raw).wrap_err("resource input is not valid JSON")?;
    let Some(object) = value.as_object() else {
        return Err(eyre!("resource input must be a JSON object"));
    };

    if DESCRIPTOR_KEYS.iter().any(|key| object.contains_key(*key)) {
        debug!("Input is a bare descriptor");
        let descriptor: ResourceDescriptor =
            serde_json::from_value(value).wrap_err("invalid resource descriptor")?;
        Ok(ResourceInput::from_descriptor(descriptor))
    } else {
        serde_json::from_value(value).wrap_err("invalid resource input")
    }
}

/// Parse a `key=value` pair
pub fn parse_tag(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected key=value, got '{raw}'")),
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
