use thiserror::Error;

/// Result type for pricing operations
pub type PricingResult<T> = Result<T, PricingError>;

/// Errors that can occur in the pricing domain
///
/// Missing prices are not errors: lookups return `None` and the estimator
/// turns that into a zero-cost answer with an explanation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PricingError {
    /// Identifier string (usually an ARN) could not be parsed
    #[error("invalid resource identifier {identifier:?}: {reason}")]
    InvalidIdentifier { identifier: String, reason: String },

    /// A required attribute was absent from the caller input
    #[error("missing required attribute '{attribute}': {context}")]
    MissingAttribute { attribute: String, context: String },

    /// None of the identification shapes produced a complete descriptor
    #[error("resource information incomplete: {0}")]
    IncompleteResource(String),

    /// Windowed cost requested with end before start
    #[error("invalid time range: end {end} is before start {start}")]
    InvalidTimeRange { start: String, end: String },

    /// Resource lives in a different region than the loaded catalog
    #[error("region mismatch: pricing data is for {client_region}, resource is in {resource_region}")]
    RegionMismatch {
        client_region: String,
        resource_region: String,
    },

    /// Resource type has no pricing formula
    #[error("unsupported resource type: {0}")]
    UnsupportedResourceType(String),

    /// Only AWS catalogs are understood
    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// Catalog could not be loaded or parsed
    #[error("pricing data unavailable: {0}")]
    Initialization(String),
}

impl PricingError {
    /// True when the caller can fix the problem by changing its input.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, PricingError::Initialization(_))
    }

    /// Short stable label, used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            PricingError::InvalidIdentifier { .. } => "invalid_identifier",
            PricingError::MissingAttribute { .. } => "missing_attribute",
            PricingError::IncompleteResource(_) => "incomplete_resource",
            PricingError::InvalidTimeRange { .. } => "invalid_time_range",
            PricingError::RegionMismatch { .. } => "region_mismatch",
            PricingError::UnsupportedResourceType(_) => "unsupported_resource_type",
            PricingError::UnsupportedProvider(_) => "unsupported_provider",
            PricingError::Initialization(_) => "initialization",
        }
    }

    pub(crate) fn invalid_identifier(identifier: &str, reason: impl Into<String>) -> Self {
        PricingError::InvalidIdentifier {
            identifier: identifier.to_string(),
            reason: reason.into(),
        }
    }
}
