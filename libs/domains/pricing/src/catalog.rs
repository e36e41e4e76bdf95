//! AWS Price List documents.
//!
//! Parses the bulk offer-file shape:
//! `products{sku: {sku, productFamily, attributes}}` plus
//! `terms.OnDemand{sku: {offerTermCode: {priceDimensions: {..}}}}`.
//! Products and terms are decoded one at a time so a single bad entry is
//! counted and skipped instead of failing the whole document.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use strum::{Display, EnumIter, EnumString};
use tracing::debug;

use crate::error::{PricingError, PricingResult};

/// Offer code of the combined multi-service document
pub const COMBINED_OFFER_CODE: &str = "Combined";

/// Service codes the index builder understands
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, EnumIter,
)]
pub enum ServiceCode {
    AmazonEC2,
    AmazonS3,
    AWSLambda,
    AmazonRDS,
    AmazonEKS,
    AmazonDynamoDB,
    AWSELB,
}

/// Parse a catalog price string: finite and non-negative, else `None`.
pub fn parse_price(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|price| price.is_finite() && *price >= 0.0)
}

/// Product attribute bag
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes(HashMap<String, String>);

impl Attributes {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self(values)
    }

    /// Trimmed attribute value; empty counts as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// Case-insensitive equality against an attribute value.
    pub fn is(&self, key: &str, expected: &str) -> bool {
        self.get(key)
            .is_some_and(|value| value.eq_ignore_ascii_case(expected))
    }

    /// Case-insensitive substring test against an attribute value.
    pub fn contains(&self, key: &str, needle: &str) -> bool {
        self.get(key).is_some_and(|value| {
            value
                .to_ascii_lowercase()
                .contains(&needle.to_ascii_lowercase())
        })
    }
}

/// The single on-demand price picked for a SKU
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTerm {
    pub unit: String,
    pub price_per_unit: String,
}

impl PriceTerm {
    pub fn rate(&self) -> Option<f64> {
        parse_price(&self.price_per_unit)
    }
}

/// One vendor SKU
#[derive(Debug, Clone, PartialEq)]
pub struct RawCatalogEntry {
    pub sku: String,
    pub product_family: String,
    pub attributes: Attributes,
    pub on_demand: Option<PriceTerm>,
}

impl RawCatalogEntry {
    /// Service code from the `servicecode` attribute, else the document's offer code.
    pub fn service_code(&self, offer_code: Option<&str>) -> Option<String> {
        self.attributes
            .get("servicecode")
            .or(offer_code.filter(|code| *code != COMBINED_OFFER_CODE))
            .map(str::to_string)
    }

    pub fn rate(&self) -> Option<f64> {
        self.on_demand.as_ref().and_then(PriceTerm::rate)
    }

    pub fn unit(&self) -> &str {
        self.on_demand
            .as_ref()
            .map(|term| term.unit.as_str())
            .unwrap_or_default()
    }
}

/// A decoded catalog document
#[derive(Debug, Clone, Default)]
pub struct RawCatalog {
    pub offer_code: Option<String>,
    pub publication_date: Option<String>,
    pub entries: Vec<RawCatalogEntry>,
    /// Products or terms that failed to decode
    pub malformed: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogDocument {
    #[serde(default)]
    offer_code: Option<String>,
    #[serde(default)]
    publication_date: Option<String>,
    #[serde(default)]
    products: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    terms: CatalogTerms,
}

#[derive(Default, Deserialize)]
struct CatalogTerms {
    #[serde(rename = "OnDemand", default)]
    on_demand: HashMap<String, serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductRecord {
    #[serde(default)]
    sku: Option<String>,
    #[serde(default)]
    product_family: String,
    #[serde(default)]
    attributes: HashMap<String, String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OfferTermRecord {
    #[serde(default)]
    price_dimensions: BTreeMap<String, PriceDimensionRecord>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceDimensionRecord {
    #[serde(default)]
    unit: String,
    #[serde(default)]
    price_per_unit: HashMap<String, String>,
    #[serde(default)]
    begin_range: Option<String>,
}

impl RawCatalog {
    /// Decode one document.
    ///
    /// Fails only when the bytes are not a price-list document at all or the
    /// document carries no products.
    pub fn from_slice(bytes: &[u8]) -> PricingResult<Self> {
        let document: CatalogDocument = serde_json::from_slice(bytes).map_err(|e| {
            PricingError::Initialization(format!("catalog is not valid price list JSON: {e}"))
        })?;

        if document.products.is_empty() {
            return Err(PricingError::Initialization(
                "catalog contains no products".to_string(),
            ));
        }

        let mut malformed = 0;
        let mut entries = Vec::with_capacity(document.products.len());

        for (sku, value) in document.products {
            let product: ProductRecord = match serde_json::from_value(value) {
                Ok(product) => product,
                Err(e) => {
                    debug!(sku = %sku, error = %e, "Skipping undecodable product");
                    malformed += 1;
                    continue;
                }
            };

            let on_demand = match document.terms.on_demand.get(&sku) {
                Some(terms) => match select_on_demand(terms) {
                    Ok(term) => term,
                    Err(e) => {
                        debug!(sku = %sku, error = %e, "Skipping undecodable price term");
                        malformed += 1;
                        None
                    }
                },
                None => None,
            };

            entries.push(RawCatalogEntry {
                sku: product.sku.unwrap_or(sku),
                product_family: product.product_family.trim().to_string(),
                attributes: Attributes::new(product.attributes),
                on_demand,
            });
        }

        Ok(Self {
            offer_code: document.offer_code,
            publication_date: document.publication_date,
            entries,
            malformed,
        })
    }
}

/// Pick one dimension out of a SKU's on-demand terms.
///
/// Dimensions are ordered by `beginRange`; the first with a strictly positive
/// price wins so free tiers are skipped. If every tier is free the first
/// parseable zero price is used, and failing that the first dimension is kept
/// so the caller sees an unpriced entry.
fn select_on_demand(terms: &serde_json::Value) -> Result<Option<PriceTerm>, serde_json::Error> {
    let offer_terms = BTreeMap::<String, OfferTermRecord>::deserialize(terms)?;

    let mut dimensions: Vec<(f64, PriceTerm)> = offer_terms
        .into_values()
        .flat_map(|term| term.price_dimensions.into_values())
        .map(|dimension| {
            let begin = dimension
                .begin_range
                .as_deref()
                .and_then(parse_price)
                .unwrap_or(0.0);
            let price = dimension
                .price_per_unit
                .get("USD")
                .cloned()
                .unwrap_or_default();
            (
                begin,
                PriceTerm {
                    unit: dimension.unit,
                    price_per_unit: price,
                },
            )
        })
        .collect();

    dimensions.sort_by(|(a, _), (b, _)| a.total_cmp(b));

    let positive = dimensions
        .iter()
        .position(|(_, term)| term.rate().is_some_and(|rate| rate > 0.0));
    let zero = dimensions.iter().position(|(_, term)| term.rate().is_some());

    let chosen = positive.or(zero).or((!dimensions.is_empty()).then_some(0));
    Ok(chosen.map(|index| dimensions.swap_remove(index).1))
}
