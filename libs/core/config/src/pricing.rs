use crate::{env_or_default, ConfigError, FromEnv};
use std::env;
use std::path::PathBuf;

pub const REGION_VAR: &str = "PRICING_REGION";
pub const CATALOG_PATH_VAR: &str = "PRICING_CATALOG_PATH";
pub const DEFAULT_REGION: &str = "us-east-1";

/// Pricing engine configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PricingConfig {
    /// The single region the pricing client serves
    pub region: String,
    /// Price list documents to index; may be empty until a CLI flag fills it
    pub catalog_paths: Vec<PathBuf>,
}

impl PricingConfig {
    pub fn new(region: impl Into<String>, catalog_paths: Vec<PathBuf>) -> Self {
        Self {
            region: region.into(),
            catalog_paths,
        }
    }

    /// Check the region shape and that at least one catalog is configured.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_region(&self.region)?;
        if self.catalog_paths.is_empty() {
            return Err(ConfigError::MissingEnvVar(CATALOG_PATH_VAR.to_string()));
        }
        Ok(())
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self::new(DEFAULT_REGION, Vec::new())
    }
}

impl FromEnv for PricingConfig {
    /// Reads from environment variables:
    /// - PRICING_REGION: defaults to us-east-1
    /// - PRICING_CATALOG_PATH: comma-separated list of price list files (optional here)
    fn from_env() -> Result<Self, ConfigError> {
        let region = env_or_default(REGION_VAR, DEFAULT_REGION).trim().to_string();
        validate_region(&region)?;

        let catalog_paths = env::var(CATALOG_PATH_VAR)
            .map(|raw| parse_paths(&raw))
            .unwrap_or_default();

        Ok(Self {
            region,
            catalog_paths,
        })
    }
}

/// Split a comma-separated path list, ignoring blanks
pub fn parse_paths(raw: &str) -> Vec<PathBuf> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .collect()
}

fn validate_region(region: &str) -> Result<(), ConfigError> {
    let valid = !region.is_empty()
        && region
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            key: REGION_VAR.to_string(),
            details: format!("'{}' is not a region code like us-east-1", region),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pricing_config_defaults() {
        temp_env::with_vars(
            [(REGION_VAR, None::<&str>), (CATALOG_PATH_VAR, None::<&str>)],
            || {
                let config = PricingConfig::from_env().unwrap();
                assert_eq!(config.region, "us-east-1");
                assert!(config.catalog_paths.is_empty());
                assert!(matches!(
                    config.validate(),
                    Err(ConfigError::MissingEnvVar(var)) if var == CATALOG_PATH_VAR
                ));
            },
        );
    }

    #[test]
    fn test_pricing_config_from_env() {
        temp_env::with_vars(
            [
                (REGION_VAR, Some("eu-west-1")),
                (CATALOG_PATH_VAR, Some("/data/ec2.json, /data/s3.json,")),
            ],
            || {
                let config = PricingConfig::from_env().unwrap();
                assert_eq!(config.region, "eu-west-1");
                assert_eq!(
                    config.catalog_paths,
                    vec![PathBuf::from("/data/ec2.json"), PathBuf::from("/data/s3.json")]
                );
                assert!(config.validate().is_ok());
            },
        );
    }

    #[test]
    fn test_pricing_config_invalid_region() {
        temp_env::with_var(REGION_VAR, Some("US East"), || {
            let result = PricingConfig::from_env();
            assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
        });
    }
}
