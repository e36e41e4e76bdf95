//! Resolves caller input into a canonical [`ResourceDescriptor`].

use std::collections::HashMap;
use tracing::debug;

use crate::arn::ParsedResourceIdentifier;
use crate::error::{PricingError, PricingResult};
use crate::models::{CloudProvider, ResourceDescriptor, ResourceInput};
use crate::tags;

/// Tag keys that may carry the SKU alongside an ARN, in priority order
pub const SKU_TAG_KEYS: &[&str] = &[
    "sku",
    "instanceType",
    "instance_class",
    "instance_type",
    "volumeType",
    "volume_type",
    "type",
];

/// Tag keys consumed by the flat-tag shape
const DESCRIPTOR_TAG_KEYS: &[&str] = &["provider", "resource_type", "sku", "region"];

/// Identity resolver bound to a default region
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    default_region: String,
}

impl IdentityResolver {
    pub fn new(default_region: impl Into<String>) -> Self {
        Self {
            default_region: default_region.into(),
        }
    }

    /// Resolve the first identification shape present in `input`.
    pub fn resolve(&self, input: &ResourceInput) -> PricingResult<ResourceDescriptor> {
        if let Some(descriptor) = input.descriptor.as_ref().filter(|d| !d.is_blank()) {
            let missing = descriptor.missing_fields();
            if !missing.is_empty() {
                return Err(PricingError::IncompleteResource(format!(
                    "descriptor is missing {}",
                    missing.join(", ")
                )));
            }
            debug!(shape = "descriptor", sku = %descriptor.sku, "Resolved resource");
            return Ok(descriptor.clone());
        }

        if let Some(arn) = input.arn.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
            return self.from_arn(arn, &input.tags);
        }

        if let Some(resource_id) = input
            .resource_id
            .as_deref()
            .map(str::trim)
            .filter(|id| id.starts_with('{'))
        {
            match serde_json::from_str::<ResourceDescriptor>(resource_id) {
                Ok(descriptor) if descriptor.is_complete() => {
                    debug!(shape = "resource_id", sku = %descriptor.sku, "Resolved resource");
                    return Ok(descriptor);
                }
                Ok(descriptor) => debug!(
                    missing = ?descriptor.missing_fields(),
                    "Serialized descriptor incomplete, falling back to tags"
                ),
                Err(e) => debug!(error = %e, "resource_id is not a descriptor, falling back to tags"),
            }
        }

        self.from_tags(&input.tags)
    }

    /// ARN plus SKU from tags.
    pub fn from_arn(
        &self,
        arn: &str,
        tags: &HashMap<String, String>,
    ) -> PricingResult<ResourceDescriptor> {
        let parsed = ParsedResourceIdentifier::parse(arn)?;

        let sku = tags::lookup(tags, SKU_TAG_KEYS).ok_or_else(|| PricingError::MissingAttribute {
            attribute: "sku".to_string(),
            context: format!(
                "an ARN does not encode the SKU; supply one of the tags {}",
                SKU_TAG_KEYS.join(", ")
            ),
        })?;

        let region = match (parsed.region.is_empty(), parsed.is_global_service()) {
            (false, _) => parsed.region.clone(),
            (true, true) => self.default_region.clone(),
            (true, false) => {
                return Err(PricingError::invalid_identifier(
                    arn,
                    format!("region is empty but '{}' is a regional service", parsed.service),
                ));
            }
        };

        let carried = tags
            .iter()
            .filter(|(key, _)| !SKU_TAG_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key)))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        debug!(
            shape = "arn",
            service = %parsed.service,
            region = %region,
            global = parsed.is_global_service(),
            "Resolved resource"
        );

        Ok(ResourceDescriptor {
            provider: CloudProvider::Aws.to_string(),
            resource_type: parsed.canonical_resource_type(),
            sku: sku.to_string(),
            region,
            tags: carried,
        })
    }

    /// Flat tag map carrying the four identifying keys.
    pub fn from_tags(&self, tags: &HashMap<String, String>) -> PricingResult<ResourceDescriptor> {
        if tags.is_empty() {
            return Err(PricingError::IncompleteResource(
                "no descriptor, ARN, serialized resource_id or tags supplied".to_string(),
            ));
        }

        let field = |key: &str| tags.get(key).map(|v| v.trim().to_string()).unwrap_or_default();
        let descriptor = ResourceDescriptor {
            provider: field("provider"),
            resource_type: field("resource_type"),
            sku: field("sku"),
            region: field("region"),
            tags: tags
                .iter()
                .filter(|(key, _)| !DESCRIPTOR_TAG_KEYS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        };

        let missing = descriptor.missing_fields();
        if !missing.is_empty() {
            return Err(PricingError::IncompleteResource(format!(
                "tags are missing {}",
                missing.join(", ")
            )));
        }

        debug!(shape = "tags", sku = %descriptor.sku, "Resolved resource");
        Ok(descriptor)
    }
}
