//! Configuration for the cost estimator

use core_config::pricing::PricingConfig;
use core_config::{Environment, FromEnv};
use eyre::Result;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub pricing: PricingConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            environment: Environment::from_env(),
            pricing: PricingConfig::from_env()?,
        })
    }

    /// Command-line flags win over the environment.
    pub fn with_overrides(mut self, region: Option<String>, catalog: Option<Vec<PathBuf>>) -> Self {
        if let Some(region) = region.filter(|r| !r.trim().is_empty()) {
            self.pricing.region = region.trim().to_string();
        }
        if let Some(paths) = catalog.filter(|p| !p.is_empty()) {
            self.pricing.catalog_paths = paths;
        }
        self
    }
}
