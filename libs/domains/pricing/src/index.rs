//! Typed per-service price indices built from raw catalog entries.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

use crate::catalog::{RawCatalog, RawCatalogEntry, ServiceCode};
use crate::models::{
    DynamoDbRates, EksSupportTier, LambdaArchitecture, LambdaRates, LoadBalancerClass,
    LoadBalancerRates,
};

/// Stats bucket for products whose service code is absent or unsupported
pub const UNROUTED: &str = "unrouted";

/// Trim and ASCII-lowercase a key part.
pub fn normalize(part: &str) -> String {
    part.trim().to_ascii_lowercase()
}

fn composite_key(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|part| normalize(part))
        .collect::<Vec<_>>()
        .join("|")
}

/// Composite key to rate, exact-match lookup only
#[derive(Debug, Clone, Default)]
pub struct PricingIndex {
    rates: HashMap<String, f64>,
}

impl PricingIndex {
    pub fn get(&self, parts: &[&str]) -> Option<f64> {
        self.rates.get(&composite_key(parts)).copied()
    }

    /// Insert a rate; on collision the lower rate is kept.
    pub(crate) fn insert(&mut self, parts: &[&str], rate: f64) {
        self.rates
            .entry(composite_key(parts))
            .and_modify(|existing| *existing = existing.min(rate))
            .or_insert(rate);
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

/// Per-service ingestion counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// Products routed to the service
    pub seen: usize,
    /// Products that produced an index entry
    pub kept: usize,
    /// Products rejected by the service filter
    pub filtered: usize,
    /// Products lacking key attributes or a usable price, plus undecodable JSON
    pub malformed: usize,
}

impl fmt::Display for IndexStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "seen={} kept={} filtered={} malformed={}",
            self.seen, self.kept, self.filtered, self.malformed
        )
    }
}

enum Admission {
    Kept,
    Filtered,
    Malformed(&'static str),
}

/// All indices for one region
#[derive(Debug, Clone, Default)]
pub struct PricingIndices {
    ec2: PricingIndex,
    ebs: PricingIndex,
    rds_instance: PricingIndex,
    rds_storage: PricingIndex,
    s3: PricingIndex,
    eks: PricingIndex,
    lambda: PricingIndex,
    dynamodb: PricingIndex,
    load_balancers: PricingIndex,
    stats: BTreeMap<String, IndexStats>,
}

impl PricingIndices {
    pub fn ec2_on_demand_hourly(
        &self,
        instance_type: &str,
        platform: &str,
        tenancy: &str,
    ) -> Option<f64> {
        self.ec2.get(&[instance_type, platform, tenancy])
    }

    pub fn ebs_monthly_per_gb(&self, volume_class: &str) -> Option<f64> {
        self.ebs.get(&[volume_class])
    }

    pub fn rds_instance_hourly(
        &self,
        instance_class: &str,
        engine: &str,
        deployment: &str,
    ) -> Option<f64> {
        self.rds_instance.get(&[instance_class, engine, deployment])
    }

    pub fn rds_storage_monthly_per_gb(&self, engine: &str, storage_class: &str) -> Option<f64> {
        self.rds_storage.get(&[engine, storage_class])
    }

    pub fn s3_monthly_per_gb(&self, storage_class: &str) -> Option<f64> {
        self.s3.get(&[storage_class])
    }

    pub fn eks_cluster_hourly(&self, tier: EksSupportTier) -> Option<f64> {
        self.eks.get(&[&tier.to_string()])
    }

    pub fn lambda_rates(&self, architecture: LambdaArchitecture) -> Option<LambdaRates> {
        let arch = architecture.to_string();
        let rates = LambdaRates {
            request: self.lambda.get(&[&arch, "requests"]),
            gb_second: self.lambda.get(&[&arch, "duration"]),
        };
        (rates != LambdaRates::default()).then_some(rates)
    }

    pub fn dynamodb_rates(&self) -> DynamoDbRates {
        DynamoDbRates {
            on_demand_read: self.dynamodb.get(&["on_demand_read"]),
            on_demand_write: self.dynamodb.get(&["on_demand_write"]),
            storage_per_gb_month: self.dynamodb.get(&["storage"]),
            provisioned_rcu_hourly: self.dynamodb.get(&["provisioned_rcu"]),
            provisioned_wcu_hourly: self.dynamodb.get(&["provisioned_wcu"]),
        }
    }

    pub fn load_balancer_rates(&self, class: LoadBalancerClass) -> Option<LoadBalancerRates> {
        let class = class.to_string();
        let rates = LoadBalancerRates {
            fixed_hourly: self.load_balancers.get(&[&class, "fixed"]),
            capacity_unit_hourly: self.load_balancers.get(&[&class, "capacity"]),
        };
        (rates != LoadBalancerRates::default()).then_some(rates)
    }

    /// Ingestion counters keyed by service code
    pub fn stats(&self) -> &BTreeMap<String, IndexStats> {
        &self.stats
    }

    /// Number of index entries across all services.
    pub fn total_entries(&self) -> usize {
        [
            &self.ec2,
            &self.ebs,
            &self.rds_instance,
            &self.rds_storage,
            &self.s3,
            &self.eks,
            &self.lambda,
            &self.dynamodb,
            &self.load_balancers,
        ]
        .iter()
        .map(|index| index.len())
        .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_entries() == 0
    }
}

/// Accumulates catalog documents into [`PricingIndices`]
#[derive(Debug, Default)]
pub struct IndexBuilder {
    indices: PricingIndices,
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest(&mut self, catalog: &RawCatalog) {
        let offer_code = catalog.offer_code.as_deref();

        if catalog.malformed > 0 {
            let bucket = offer_code
                .filter(|code| ServiceCode::from_str(code).is_ok())
                .unwrap_or(UNROUTED);
            let stats = self.indices.stats.entry(bucket.to_string()).or_default();
            stats.seen += catalog.malformed;
            stats.malformed += catalog.malformed;
        }

        for entry in &catalog.entries {
            let service = entry
                .service_code(offer_code)
                .and_then(|code| ServiceCode::from_str(&code).ok());

            let Some(service) = service else {
                let stats = self.indices.stats.entry(UNROUTED.to_string()).or_default();
                stats.seen += 1;
                stats.filtered += 1;
                continue;
            };

            let admission = match service {
                ServiceCode::AmazonEC2 => self.admit_ec2(entry),
                ServiceCode::AmazonS3 => self.admit_s3(entry),
                ServiceCode::AWSLambda => self.admit_lambda(entry),
                ServiceCode::AmazonRDS => self.admit_rds(entry),
                ServiceCode::AmazonEKS => self.admit_eks(entry),
                ServiceCode::AmazonDynamoDB => self.admit_dynamodb(entry),
                ServiceCode::AWSELB => self.admit_load_balancer(entry),
            };

            let stats = self.indices.stats.entry(service.to_string()).or_default();
            stats.seen += 1;
            match admission {
                Admission::Kept => stats.kept += 1,
                Admission::Filtered => stats.filtered += 1,
                Admission::Malformed(reason) => {
                    debug!(sku = %entry.sku, service = %service, reason, "Skipping catalog entry");
                    stats.malformed += 1;
                }
            }
        }
    }

    pub fn finish(self) -> PricingIndices {
        for (service, stats) in &self.indices.stats {
            info!(
                service = %service,
                seen = stats.seen,
                kept = stats.kept,
                filtered = stats.filtered,
                malformed = stats.malformed,
                "Indexed pricing catalog"
            );
        }
        self.indices
    }

    fn admit_ec2(&mut self, entry: &RawCatalogEntry) -> Admission {
        let attrs = &entry.attributes;
        match entry.product_family.as_str() {
            "Compute Instance" => {
                let pre_installed_none = attrs
                    .get("preInstalledSw")
                    .is_none_or(|sw| sw.eq_ignore_ascii_case("NA"));
                let byol = attrs.contains("licenseModel", "bring your own");
                if !attrs.is("capacitystatus", "Used")
                    || !pre_installed_none
                    || byol
                    || !attrs.get("operatingSystem").is_some_and(is_priced_platform)
                {
                    return Admission::Filtered;
                }

                let (Some(instance_type), Some(platform), Some(tenancy)) = (
                    attrs.get("instanceType"),
                    attrs.get("operatingSystem"),
                    attrs.get("tenancy"),
                ) else {
                    return Admission::Malformed("missing instanceType or tenancy");
                };
                let Some(rate) = entry.rate() else {
                    return Admission::Malformed("no usable on-demand price");
                };
                self.indices
                    .ec2
                    .insert(&[instance_type, platform, tenancy], rate);
                Admission::Kept
            }
            "Storage" => {
                let Some(volume) = attrs.get("volumeApiName") else {
                    return Admission::Filtered;
                };
                let Some(rate) = entry.rate() else {
                    return Admission::Malformed("no usable on-demand price");
                };
                self.indices.ebs.insert(&[volume], rate);
                Admission::Kept
            }
            _ => Admission::Filtered,
        }
    }

    fn admit_s3(&mut self, entry: &RawCatalogEntry) -> Admission {
        let attrs = &entry.attributes;
        if entry.product_family != "Storage" || !attrs.is("servicecode", "AmazonS3") {
            return Admission::Filtered;
        }
        let Some(class) = attrs.get("volumeType").or(attrs.get("storageClass")) else {
            return Admission::Malformed("missing volumeType");
        };
        let Some(rate) = entry.rate() else {
            return Admission::Malformed("no usable on-demand price");
        };
        self.indices.s3.insert(&[class], rate);
        Admission::Kept
    }

    fn admit_lambda(&mut self, entry: &RawCatalogEntry) -> Admission {
        if !matches!(entry.product_family.as_str(), "Serverless" | "AWS Lambda") {
            return Admission::Filtered;
        }
        let Some(group) = entry.attributes.get("group") else {
            return Admission::Malformed("missing group");
        };
        let (architecture, component) = match group {
            "AWS-Lambda-Requests" => (LambdaArchitecture::X86_64, "requests"),
            "AWS-Lambda-Duration" => (LambdaArchitecture::X86_64, "duration"),
            "AWS-Lambda-Requests-ARM" => (LambdaArchitecture::Arm64, "requests"),
            "AWS-Lambda-Duration-ARM" => (LambdaArchitecture::Arm64, "duration"),
            _ => return Admission::Filtered,
        };
        let Some(rate) = entry.rate() else {
            return Admission::Malformed("no usable on-demand price");
        };
        self.indices
            .lambda
            .insert(&[&architecture.to_string(), component], rate);
        Admission::Kept
    }

    fn admit_rds(&mut self, entry: &RawCatalogEntry) -> Admission {
        let attrs = &entry.attributes;
        match entry.product_family.as_str() {
            "Database Instance" => {
                if !attrs.is("deploymentOption", "Single-AZ") {
                    return Admission::Filtered;
                }
                let (Some(class), Some(engine), Some(deployment)) = (
                    attrs.get("instanceType"),
                    attrs.get("databaseEngine"),
                    attrs.get("deploymentOption"),
                ) else {
                    return Admission::Malformed("missing instanceType or databaseEngine");
                };
                let Some(rate) = entry.rate() else {
                    return Admission::Malformed("no usable on-demand price");
                };
                self.indices
                    .rds_instance
                    .insert(&[class, engine, deployment], rate);
                Admission::Kept
            }
            "Database Storage" => {
                let engine = attrs.get("databaseEngine").unwrap_or("Any");
                let Some(volume_type) = attrs.get("volumeType") else {
                    return Admission::Malformed("missing volumeType");
                };
                let Some(rate) = entry.rate() else {
                    return Admission::Malformed("no usable on-demand price");
                };
                self.indices.rds_storage.insert(&[engine, volume_type], rate);
                Admission::Kept
            }
            _ => Admission::Filtered,
        }
    }

    fn admit_eks(&mut self, entry: &RawCatalogEntry) -> Admission {
        let attrs = &entry.attributes;
        let tier = if attrs.contains("usagetype", "extendedsupport") {
            EksSupportTier::Extended
        } else if attrs.contains("usagetype", "hours:percluster") {
            EksSupportTier::Standard
        } else {
            return Admission::Filtered;
        };
        let Some(rate) = entry.rate() else {
            return Admission::Malformed("no usable on-demand price");
        };
        self.indices.eks.insert(&[&tier.to_string()], rate);
        Admission::Kept
    }

    fn admit_dynamodb(&mut self, entry: &RawCatalogEntry) -> Admission {
        let attrs = &entry.attributes;
        let reads = attrs.contains("group", "readunits");
        let writes = attrs.contains("group", "writeunits");

        let component = match entry.product_family.as_str() {
            "Amazon DynamoDB PayPerRequest Throughput" if reads => "on_demand_read",
            "Amazon DynamoDB PayPerRequest Throughput" if writes => "on_demand_write",
            "Provisioned IOPS" if reads => "provisioned_rcu",
            "Provisioned IOPS" if writes => "provisioned_wcu",
            "Database Storage"
                if attrs.contains("usagetype", "timedstorage-bytehrs")
                    && !attrs.contains("usagetype", "ia-timedstorage") =>
            {
                "storage"
            }
            _ => return Admission::Filtered,
        };
        let Some(rate) = entry.rate() else {
            return Admission::Malformed("no usable on-demand price");
        };
        self.indices.dynamodb.insert(&[component], rate);
        Admission::Kept
    }

    fn admit_load_balancer(&mut self, entry: &RawCatalogEntry) -> Admission {
        let attrs = &entry.attributes;
        let class = match entry.product_family.as_str() {
            "Load Balancer-Application" => LoadBalancerClass::Application,
            "Load Balancer-Network" => LoadBalancerClass::Network,
            _ if attrs.contains("group", "application") => LoadBalancerClass::Application,
            _ if attrs.contains("group", "network") => LoadBalancerClass::Network,
            _ => return Admission::Filtered,
        };

        let unit = entry.unit();
        let component = if unit.to_ascii_uppercase().contains("LCU")
            || attrs.contains("usagetype", "lcuusage")
        {
            "capacity"
        } else if unit.eq_ignore_ascii_case("Hrs") || attrs.contains("usagetype", "loadbalancerusage")
        {
            "fixed"
        } else {
            return Admission::Filtered;
        };

        let Some(rate) = entry.rate() else {
            return Admission::Malformed("no usable on-demand price");
        };
        self.indices
            .load_balancers
            .insert(&[&class.to_string(), component], rate);
        Admission::Kept
    }
}

fn is_priced_platform(os: &str) -> bool {
    os.eq_ignore_ascii_case("Linux")
        || os.eq_ignore_ascii_case("Windows")
        || os.eq_ignore_ascii_case("RHEL")
        || os.contains("Red Hat")
        || os.contains("SUSE")
}

/// Build indices from decoded documents.
pub fn build_indices(catalogs: &[RawCatalog]) -> PricingIndices {
    let mut builder = IndexBuilder::new();
    for catalog in catalogs {
        builder.ingest(catalog);
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Attributes, PriceTerm};

    fn entry(family: &str, attrs: &[(&str, &str)], unit: &str, price: &str) -> RawCatalogEntry {
        RawCatalogEntry {
            sku: format!("SKU-{family}-{price}"),
            product_family: family.to_string(),
            attributes: Attributes::new(
                attrs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            on_demand: Some(PriceTerm {
                unit: unit.to_string(),
                price_per_unit: price.to_string(),
            }),
        }
    }

    fn ec2(instance: &str, os: &str, price: &str) -> RawCatalogEntry {
        entry(
            "Compute Instance",
            &[
                ("servicecode", "AmazonEC2"),
                ("instanceType", instance),
                ("operatingSystem", os),
                ("tenancy", "Shared"),
                ("capacitystatus", "Used"),
                ("preInstalledSw", "NA"),
            ],
            "Hrs",
            price,
        )
    }

    fn catalog(entries: Vec<RawCatalogEntry>) -> RawCatalog {
        RawCatalog {
            offer_code: Some("Combined".to_string()),
            entries,
            ..Default::default()
        }
    }

    #[test]
    fn test_keys_are_normalized() {
        let indices = build_indices(&[catalog(vec![ec2("t3.micro", "Linux", "0.0104")])]);
        assert_eq!(
            indices.ec2_on_demand_hourly(" T3.MICRO ", "linux", "SHARED"),
            Some(0.0104)
        );
        assert_eq!(indices.ec2_on_demand_hourly("t3.micro", "Windows", "Shared"), None);
    }

    #[test]
    fn test_collision_keeps_lower_rate_regardless_of_order() {
        let a = build_indices(&[catalog(vec![
            ec2("m5.large", "Linux", "0.096"),
            ec2("m5.large", "Linux", "0.090"),
        ])]);
        let b = build_indices(&[catalog(vec![
            ec2("m5.large", "Linux", "0.090"),
            ec2("m5.large", "Linux", "0.096"),
        ])]);
        assert_eq!(a.ec2_on_demand_hourly("m5.large", "Linux", "Shared"), Some(0.090));
        assert_eq!(b.ec2_on_demand_hourly("m5.large", "Linux", "Shared"), Some(0.090));
    }

    #[test]
    fn test_ec2_filters_and_stats() {
        let mut reserved = ec2("t3.micro", "Linux", "0.5");
        reserved.attributes = Attributes::new(
            [
                ("servicecode", "AmazonEC2"),
                ("instanceType", "t3.micro"),
                ("operatingSystem", "Linux"),
                ("tenancy", "Shared"),
                ("capacitystatus", "AllocatedCapacityReservation"),
            ]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        );
        let mut sql = ec2("t3.micro", "Windows", "0.9");
        sql.attributes = Attributes::new(
            [
                ("servicecode", "AmazonEC2"),
                ("instanceType", "t3.micro"),
                ("operatingSystem", "Windows"),
                ("tenancy", "Shared"),
                ("capacitystatus", "Used"),
                ("preInstalledSw", "SQL Std"),
            ]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        );

        let indices = build_indices(&[catalog(vec![
            ec2("t3.micro", "Linux", "0.0104"),
            ec2("t3.micro", "Red Hat Enterprise Linux", "0.0704"),
            ec2("t3.micro", "FreeBSD", "0.01"),
            ec2("t3.small", "Linux", "not-a-price"),
            reserved,
            sql,
        ])]);

        let stats = indices.stats()["AmazonEC2"];
        assert_eq!(stats.seen, 6);
        assert_eq!(stats.kept, 2);
        assert_eq!(stats.filtered, 3);
        assert_eq!(stats.malformed, 1);
        assert_eq!(
            indices.ec2_on_demand_hourly("t3.micro", "Red Hat Enterprise Linux", "Shared"),
            Some(0.0704)
        );
        assert_eq!(indices.ec2_on_demand_hourly("t3.small", "Linux", "Shared"), None);
    }

    #[test]
    fn test_unsupported_service_is_unrouted() {
        let indices = build_indices(&[catalog(vec![entry(
            "Queue",
            &[("servicecode", "AWSQueueService")],
            "Requests",
            "0.0000004",
        )])]);
        assert_eq!(indices.stats()[UNROUTED].filtered, 1);
        assert!(indices.is_empty());
    }

    #[test]
    fn test_load_balancer_components() {
        let indices = build_indices(&[catalog(vec![
            entry(
                "Load Balancer-Application",
                &[("servicecode", "AWSELB"), ("usagetype", "LoadBalancerUsage")],
                "Hrs",
                "0.0225",
            ),
            entry(
                "Load Balancer-Application",
                &[("servicecode", "AWSELB"), ("usagetype", "LCUUsage")],
                "LCU-Hrs",
                "0.008",
            ),
            entry(
                "Load Balancer",
                &[("servicecode", "AWSELB"), ("group", "ELB:Network")],
                "NLCU-Hrs",
                "0.006",
            ),
        ])]);

        let alb = indices
            .load_balancer_rates(LoadBalancerClass::Application)
            .unwrap();
        assert_eq!(alb.fixed_hourly, Some(0.0225));
        assert_eq!(alb.capacity_unit_hourly, Some(0.008));

        let nlb = indices.load_balancer_rates(LoadBalancerClass::Network).unwrap();
        assert_eq!(nlb.fixed_hourly, None);
        assert_eq!(nlb.capacity_unit_hourly, Some(0.006));
    }

    #[test]
    fn test_dynamodb_struct_and_lambda_rates() {
        let indices = build_indices(&[catalog(vec![
            entry(
                "Amazon DynamoDB PayPerRequest Throughput",
                &[("servicecode", "AmazonDynamoDB"), ("group", "DDB-ReadUnits")],
                "ReadRequestUnits",
                "0.00000025",
            ),
            entry(
                "Database Storage",
                &[("servicecode", "AmazonDynamoDB"), ("usagetype", "TimedStorage-ByteHrs")],
                "GB-Mo",
                "0.25",
            ),
            entry(
                "Database Storage",
                &[("servicecode", "AmazonDynamoDB"), ("usagetype", "IA-TimedStorage-ByteHrs")],
                "GB-Mo",
                "0.10",
            ),
            entry(
                "Serverless",
                &[("servicecode", "AWSLambda"), ("group", "AWS-Lambda-Requests-ARM")],
                "Requests",
                "0.0000002",
            ),
        ])]);

        let ddb = indices.dynamodb_rates();
        assert_eq!(ddb.on_demand_read, Some(0.00000025));
        assert_eq!(ddb.storage_per_gb_month, Some(0.25));
        assert_eq!(ddb.on_demand_write, None);

        let arm = indices.lambda_rates(LambdaArchitecture::Arm64).unwrap();
        assert_eq!(arm.request, Some(0.0000002));
        assert_eq!(arm.gb_second, None);
        assert!(indices.lambda_rates(LambdaArchitecture::X86_64).is_none());
    }

    #[test]
    fn test_catalog_level_malformed_counted_against_offer() {
        let indices = build_indices(&[RawCatalog {
            offer_code: Some("AmazonEKS".to_string()),
            entries: vec![],
            malformed: 2,
            ..Default::default()
        }]);
        assert_eq!(indices.stats()["AmazonEKS"].malformed, 2);
    }
}
