//! Carbon footprint of EC2 instances.
//!
//! Power draw uses Cloud Carbon Footprint style coefficients: watts per vCPU at
//! idle and at full load, interpolated linearly by CPU utilization. Energy is
//! scaled by the data centre PUE and converted to CO2e with the region's grid
//! emission factor.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Utilization assumed when neither the resource nor the caller supplies one
pub const DEFAULT_UTILIZATION: f64 = 0.5;

/// Power usage effectiveness of AWS data centres
pub const AWS_PUE: f64 = 1.135;

const INSTANCE_SPECS_CSV: &str = include_str!("../data/ccf_instance_specs.csv");

/// Grid emission factors, grams CO2e per kWh
const GRID_FACTORS: &[(&str, f64)] = &[
    ("us-east-1", 379.069),
    ("us-east-2", 410.608),
    ("us-west-1", 322.167),
    ("us-west-2", 322.167),
    ("us-gov-east-1", 379.069),
    ("us-gov-west-1", 322.167),
    ("ca-central-1", 130.0),
    ("sa-east-1", 74.0),
    ("eu-west-1", 278.6),
    ("eu-west-2", 225.0),
    ("eu-west-3", 51.1),
    ("eu-central-1", 338.0),
    ("eu-south-1", 233.0),
    ("eu-north-1", 8.8),
    ("af-south-1", 900.6),
    ("me-south-1", 732.0),
    ("ap-east-1", 710.0),
    ("ap-south-1", 708.0),
    ("ap-northeast-1", 465.8),
    ("ap-northeast-2", 415.6),
    ("ap-northeast-3", 465.8),
    ("ap-southeast-1", 408.0),
    ("ap-southeast-2", 790.0),
    ("cn-north-1", 537.4),
    ("cn-northwest-1", 537.4),
];

/// Power characteristics of one instance type
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InstanceSpec {
    pub instance_type: String,
    pub vcpu_count: u32,
    /// Watts per vCPU at idle
    pub min_watts: f64,
    /// Watts per vCPU at 100% utilization
    pub max_watts: f64,
}

impl InstanceSpec {
    fn is_valid(&self) -> bool {
        !self.instance_type.trim().is_empty()
            && self.vcpu_count >= 1
            && self.min_watts.is_finite()
            && self.max_watts.is_finite()
            && self.min_watts >= 0.0
            && self.max_watts >= self.min_watts
    }
}

static INSTANCE_SPECS: Lazy<HashMap<String, InstanceSpec>> =
    Lazy::new(|| parse_instance_specs(INSTANCE_SPECS_CSV));

/// Parse spec rows keyed by lowercased instance type; bad rows are skipped.
fn parse_instance_specs(raw: &str) -> HashMap<String, InstanceSpec> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(raw.as_bytes());

    let mut specs = HashMap::new();
    for (line, record) in reader.deserialize::<InstanceSpec>().enumerate() {
        // +2: one for the header, one for 1-based line numbers
        let line = line + 2;
        match record {
            Ok(spec) if spec.is_valid() => {
                specs.insert(spec.instance_type.to_ascii_lowercase(), spec);
            }
            Ok(spec) => debug!(
                line,
                instance_type = %spec.instance_type,
                "Skipping instance spec with invalid power values"
            ),
            Err(e) => warn!(line, error = %e, "Skipping malformed instance spec row"),
        }
    }
    specs
}

pub fn instance_spec(instance_type: &str) -> Option<&'static InstanceSpec> {
    INSTANCE_SPECS.get(&instance_type.trim().to_ascii_lowercase())
}

pub fn instance_spec_count() -> usize {
    INSTANCE_SPECS.len()
}

/// Grams CO2e per kWh for a region, if known.
pub fn grid_factor(region: &str) -> Option<f64> {
    let region = region.trim().to_ascii_lowercase();
    GRID_FACTORS
        .iter()
        .find(|(name, _)| *name == region)
        .map(|(_, factor)| *factor)
}

/// Pick the utilization to apply: per-resource value, then the caller's,
/// then [`DEFAULT_UTILIZATION`]. Non-positive values count as unset; the
/// result is clamped to `[0, 1]`.
pub fn utilization(per_resource: Option<f64>, requested: Option<f64>) -> f64 {
    let usable = |value: Option<f64>| value.filter(|v| v.is_finite() && *v > 0.0);
    usable(per_resource)
        .or_else(|| usable(requested))
        .map_or(DEFAULT_UTILIZATION, |v| v.clamp(0.0, 1.0))
}

/// Estimated emissions of one instance over some runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarbonFootprint {
    pub instance_type: String,
    pub vcpu_count: u32,
    pub utilization: f64,
    pub hours: f64,
    /// Facility energy including PUE
    pub energy_kwh: f64,
    pub grid_factor_g_per_kwh: f64,
    pub co2e_grams: f64,
}

impl CarbonFootprint {
    /// Same instance and utilization over a different runtime.
    pub fn over_hours(&self, hours: f64) -> Self {
        let ratio = if self.hours > 0.0 { hours / self.hours } else { 0.0 };
        Self {
            hours,
            energy_kwh: self.energy_kwh * ratio,
            co2e_grams: self.co2e_grams * ratio,
            ..self.clone()
        }
    }
}

/// Footprint for `hours` of runtime; `None` when the instance type or the
/// region has no coefficients.
pub fn estimate(
    instance_type: &str,
    region: &str,
    utilization: f64,
    hours: f64,
) -> Option<CarbonFootprint> {
    let spec = instance_spec(instance_type)?;
    let grid = grid_factor(region)?;

    let utilization = if utilization.is_finite() {
        utilization.clamp(0.0, 1.0)
    } else {
        DEFAULT_UTILIZATION
    };
    let watts_per_vcpu = spec.min_watts + utilization * (spec.max_watts - spec.min_watts);
    let energy_kwh = watts_per_vcpu * f64::from(spec.vcpu_count) * hours / 1000.0 * AWS_PUE;

    Some(CarbonFootprint {
        instance_type: spec.instance_type.clone(),
        vcpu_count: spec.vcpu_count,
        utilization,
        hours,
        energy_kwh,
        grid_factor_g_per_kwh: grid,
        co2e_grams: energy_kwh * grid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_specs_load() {
        assert!(instance_spec_count() > 100);

        let spec = instance_spec("T3.Micro").unwrap();
        assert_eq!(spec.vcpu_count, 2);
        assert_eq!(spec.min_watts, 0.64);
        assert_eq!(spec.max_watts, 3.97);

        assert!(instance_spec("t99.mega").is_none());
    }

    #[test]
    fn test_invalid_rows_are_skipped() {
        let raw = "instance_type,vcpu_count,min_watts,max_watts\n\
                   a.large,2,0.5,2.0\n\
                   b.large,0,0.5,2.0\n\
                   c.large,2,3.0,1.0\n\
                   d.large,two,0.5,2.0\n\
                   ,2,0.5,2.0\n";
        let specs = parse_instance_specs(raw);
        assert_eq!(specs.len(), 1);
        assert!(specs.contains_key("a.large"));
    }

    #[test]
    fn test_utilization_priority() {
        assert_eq!(utilization(Some(0.8), Some(0.3)), 0.8);
        assert_eq!(utilization(None, Some(0.3)), 0.3);
        assert_eq!(utilization(Some(0.0), Some(0.3)), 0.3);
        assert_eq!(utilization(Some(-1.0), None), DEFAULT_UTILIZATION);
        assert_eq!(utilization(Some(f64::NAN), None), DEFAULT_UTILIZATION);
        assert_eq!(utilization(Some(1.7), None), 1.0);
        assert_eq!(utilization(None, None), DEFAULT_UTILIZATION);
    }

    #[test]
    fn test_grid_factor_lookup() {
        assert_eq!(grid_factor("us-east-1"), Some(379.069));
        assert_eq!(grid_factor(" EU-NORTH-1 "), Some(8.8));
        assert_eq!(grid_factor("mars-north-1"), None);
    }

    #[test]
    fn test_estimate_interpolates_power() {
        let footprint = estimate("t3.micro", "us-east-1", 0.5, 730.0).unwrap();

        let watts = 0.64 + 0.5 * (3.97 - 0.64);
        let kwh = watts * 2.0 * 730.0 / 1000.0 * AWS_PUE;
        assert!((footprint.energy_kwh - kwh).abs() < 1e-9);
        assert!((footprint.co2e_grams - kwh * 379.069).abs() < 1e-6);

        let idle = estimate("t3.micro", "us-east-1", 0.0, 730.0).unwrap();
        let busy = estimate("t3.micro", "us-east-1", 1.0, 730.0).unwrap();
        assert!(idle.co2e_grams < footprint.co2e_grams);
        assert!(footprint.co2e_grams < busy.co2e_grams);

        // Graviton draws less for the same shape
        let graviton = estimate("t4g.micro", "us-east-1", 0.5, 730.0).unwrap();
        assert!(graviton.co2e_grams < footprint.co2e_grams);

        assert!(estimate("t3.micro", "mars-north-1", 0.5, 730.0).is_none());
        assert!(estimate("t99.mega", "us-east-1", 0.5, 730.0).is_none());
    }

    #[test]
    fn test_over_hours_scales_linearly() {
        let monthly = estimate("m5.large", "eu-west-1", 0.5, 730.0).unwrap();
        let day = monthly.over_hours(24.0);
        assert_eq!(day.hours, 24.0);
        assert!((day.co2e_grams - monthly.co2e_grams * 24.0 / 730.0).abs() < 1e-9);
        assert_eq!(day.utilization, monthly.utilization);
    }
}
