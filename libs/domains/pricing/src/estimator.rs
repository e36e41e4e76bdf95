//! Projected and windowed cost estimation.
//!
//! Every resource type has one formula. Missing usage tags fall back to a
//! documented default which is written into `billing_detail`; a rate missing
//! from the catalog yields zero cost plus an explanation, never an error.

use chrono::{DateTime, Utc};
use observability::PricingMetrics;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::carbon::{self, CarbonFootprint};
use crate::client::PriceLookup;
use crate::error::{PricingError, PricingResult};
use crate::identity::IdentityResolver;
use crate::models::{
    CloudProvider, CostEstimate, CostSource, Currency, EksSupportTier, HOURS_PER_MONTH,
    LambdaArchitecture, LoadBalancerClass, ResourceDescriptor, ResourceInput, ResourceKind,
};
use crate::tags::{self, Usage, UsageOrigin};

/// Default EBS volume size when no size tag is given
pub const DEFAULT_EBS_SIZE_GB: f64 = 8.0;
/// Default RDS allocated storage
pub const DEFAULT_RDS_STORAGE_GB: f64 = 20.0;
/// Default Lambda memory
pub const DEFAULT_LAMBDA_MEMORY_MB: f64 = 128.0;

const RDS_DEPLOYMENT: &str = "Single-AZ";

/// EC2 API tenancy values to catalog `tenancy` values
const TENANCIES: &[(&str, &str)] = &[
    ("default", "Shared"),
    ("shared", "Shared"),
    ("dedicated", "Dedicated"),
    ("host", "Host"),
];

/// Caller-facing storage class names to catalog `volumeType` values
const S3_STORAGE_CLASSES: &[(&str, &str)] = &[
    ("standard", "Standard"),
    ("standard_ia", "Standard - Infrequent Access"),
    ("onezone_ia", "One Zone - Infrequent Access"),
    ("intelligent_tiering", "Intelligent-Tiering Frequent Access"),
    ("glacier", "Amazon Glacier"),
    ("glacier_ir", "Glacier Instant Retrieval"),
    ("deep_archive", "Glacier Deep Archive"),
    ("reduced_redundancy", "Reduced Redundancy"),
];

/// RDS storage API names to catalog `volumeType` values
const RDS_STORAGE_CLASSES: &[(&str, &str)] = &[
    ("gp2", "General Purpose"),
    ("gp3", "General Purpose-GP3"),
    ("io1", "Provisioned IOPS"),
    ("io2", "Provisioned IOPS-IO2"),
    ("standard", "Magnetic"),
    ("magnetic", "Magnetic"),
];

const RDS_ENGINES: &[(&str, &str)] = &[
    ("postgres", "PostgreSQL"),
    ("postgresql", "PostgreSQL"),
    ("mysql", "MySQL"),
    ("mariadb", "MariaDB"),
    ("aurora-mysql", "Aurora MySQL"),
    ("aurora-postgresql", "Aurora PostgreSQL"),
];

fn alias(table: &[(&str, &'static str)], value: &str) -> Option<&'static str> {
    let lowered = value.trim().to_ascii_lowercase();
    table
        .iter()
        .find(|(name, _)| *name == lowered)
        .map(|(_, canonical)| *canonical)
}

fn canonical_platform(raw: &str) -> &str {
    match raw.trim().to_ascii_lowercase().as_str() {
        "linux" | "linux/unix" | "amazon linux" => "Linux",
        "windows" => "Windows",
        "rhel" | "redhat" | "red hat" => "Red Hat Enterprise Linux",
        "suse" | "sles" => "SUSE",
        _ => raw,
    }
}

/// Hours between `start` and `end`; end before start is an error.
pub fn runtime_hours(start: DateTime<Utc>, end: DateTime<Utc>) -> PricingResult<f64> {
    if end < start {
        return Err(PricingError::InvalidTimeRange {
            start: start.to_rfc3339(),
            end: end.to_rfc3339(),
        });
    }
    let elapsed = end - start;
    let hours = match elapsed.num_nanoseconds() {
        Some(nanos) => nanos as f64 / 3_600_000_000_000.0,
        // Beyond ~292 years nanoseconds overflow; millisecond precision is plenty there.
        None => elapsed.num_milliseconds() as f64 / 3_600_000.0,
    };
    Ok(hours)
}

/// Outcome of one formula
struct Priced {
    monthly: f64,
    detail: String,
    rate_found: bool,
    defaults: Vec<String>,
    carbon: Option<CarbonFootprint>,
}

impl Priced {
    fn found(monthly: f64, detail: String) -> Self {
        Self {
            monthly,
            detail,
            rate_found: true,
            defaults: Vec::new(),
            carbon: None,
        }
    }

    fn not_found(what: String, region: &str) -> Self {
        Self {
            monthly: 0.0,
            detail: format!("{what} not found in pricing data for {region}"),
            rate_found: false,
            defaults: Vec::new(),
            carbon: None,
        }
    }

    fn with_defaults(mut self, defaults: Vec<String>) -> Self {
        self.defaults = defaults;
        self
    }

    fn with_carbon(mut self, carbon: Option<CarbonFootprint>) -> Self {
        self.carbon = carbon;
        self
    }

    fn billing_detail(&self) -> String {
        if self.defaults.is_empty() {
            self.detail.clone()
        } else {
            format!("{} [defaults: {}]", self.detail, self.defaults.join("; "))
        }
    }
}

/// Collects the defaults applied while reading tags
#[derive(Default)]
struct Defaults(Vec<String>);

impl Defaults {
    fn text<'a>(
        &mut self,
        tags: &'a HashMap<String, String>,
        keys: &[&str],
        name: &str,
        default: &'a str,
    ) -> &'a str {
        let (value, defaulted) = tags::text_or(tags, keys, default);
        if defaulted {
            self.0.push(format!("{name}={default}"));
        }
        value
    }

    fn usage(
        &mut self,
        tags: &HashMap<String, String>,
        keys: &[&str],
        name: &str,
        default: f64,
    ) -> Usage {
        let usage = tags::usage(tags, keys, default);
        if usage.is_defaulted() {
            self.0.push(format!("{name}={usage}"));
        }
        usage
    }

    fn note(&mut self, note: String) {
        self.0.push(note);
    }
}

/// Cost estimator over a shared price lookup
pub struct CostEstimator<P: PriceLookup> {
    pricing: Arc<P>,
    resolver: IdentityResolver,
    /// Caller-level CPU utilization for carbon estimates
    utilization: Option<f64>,
}

impl<P: PriceLookup> CostEstimator<P> {
    /// Create a new estimator
    pub fn new(pricing: Arc<P>) -> Self {
        let resolver = IdentityResolver::new(pricing.region());
        Self {
            pricing,
            resolver,
            utilization: None,
        }
    }

    /// Utilization applied to instances that carry no `utilization` tag.
    pub fn with_utilization(mut self, utilization: f64) -> Self {
        self.utilization = Some(utilization);
        self
    }

    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    /// Steady-state monthly cost for any identification shape
    pub fn projected_cost(&self, input: &ResourceInput) -> PricingResult<CostEstimate> {
        let descriptor = self.resolver.resolve(input)?;
        self.projected_cost_for(&descriptor)
    }

    /// Steady-state monthly cost for a canonical descriptor
    pub fn projected_cost_for(&self, descriptor: &ResourceDescriptor) -> PricingResult<CostEstimate> {
        let started = Instant::now();
        let result = self.admit(descriptor).and_then(|kind| self.price(kind, descriptor));
        self.record(
            "projected",
            descriptor,
            result.as_ref().map(|priced| priced.rate_found),
            started,
        );

        let priced = result?;
        Ok(CostEstimate::projected(priced.monthly, priced.billing_detail()).with_carbon(priced.carbon))
    }

    /// Cost over `[start, end]`, pro-rated from the monthly projection
    pub fn actual_cost(
        &self,
        input: &ResourceInput,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PricingResult<CostEstimate> {
        runtime_hours(start, end)?;
        let descriptor = self.resolver.resolve(input)?;
        self.actual_cost_for(&descriptor, start, end)
    }

    pub fn actual_cost_for(
        &self,
        descriptor: &ResourceDescriptor,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PricingResult<CostEstimate> {
        let started = Instant::now();
        let result = runtime_hours(start, end).and_then(|hours| {
            let kind = self.admit(descriptor)?;
            if hours == 0.0 {
                return Ok((hours, None));
            }
            self.price(kind, descriptor).map(|priced| (hours, Some(priced)))
        });
        self.record(
            "actual",
            descriptor,
            result
                .as_ref()
                .map(|(_, priced)| priced.as_ref().map_or(true, |p| p.rate_found)),
            started,
        );

        let (hours, priced) = result?;
        let window = format!("{} to {}", start.to_rfc3339(), end.to_rfc3339());
        let (cost, detail, carbon) = match priced {
            None => (
                0.0,
                format!("zero-length window ({window}); no runtime to charge"),
                None,
            ),
            Some(priced) => (
                priced.monthly * (hours / HOURS_PER_MONTH),
                format!(
                    "{}; pro-rated over {hours:.2} hours ({window}); approximation from list prices, not measured billing",
                    priced.billing_detail()
                ),
                priced.carbon.map(|footprint| footprint.over_hours(hours)),
            ),
        };

        Ok(CostEstimate {
            cost,
            currency: Currency::Usd,
            billing_detail: detail,
            source: CostSource::Derived,
            usage_hours: Some(hours),
            carbon,
        })
    }

    /// Provider, region and type checks shared by both cost kinds.
    fn admit(&self, descriptor: &ResourceDescriptor) -> PricingResult<ResourceKind> {
        match CloudProvider::from_str(descriptor.provider.trim()) {
            Ok(CloudProvider::Aws) => {}
            _ => return Err(PricingError::UnsupportedProvider(descriptor.provider.clone())),
        }

        let client_region = self.pricing.region();
        if !descriptor.region.trim().eq_ignore_ascii_case(&client_region) {
            return Err(PricingError::RegionMismatch {
                client_region,
                resource_region: descriptor.region.clone(),
            });
        }

        ResourceKind::detect(&descriptor.resource_type)
            .ok_or_else(|| PricingError::UnsupportedResourceType(descriptor.resource_type.clone()))
    }

    fn price(&self, kind: ResourceKind, descriptor: &ResourceDescriptor) -> PricingResult<Priced> {
        self.pricing.ensure_ready()?;

        let sku = descriptor.sku.trim();
        let tags = &descriptor.tags;
        let priced = match kind {
            ResourceKind::Ec2 => self.ec2(sku, tags),
            ResourceKind::Ebs => self.ebs(sku, tags),
            ResourceKind::Rds => self.rds(sku, tags),
            ResourceKind::S3 => self.s3(sku, tags),
            ResourceKind::Lambda => self.lambda(tags),
            ResourceKind::DynamoDb => self.dynamodb(sku, tags),
            ResourceKind::Eks => self.eks(tags),
            ResourceKind::Elb => self.load_balancer(&descriptor.resource_type, sku, tags),
        };

        debug!(
            resource_type = %kind,
            sku = sku,
            monthly = priced.monthly,
            rate_found = priced.rate_found,
            "Priced resource"
        );
        Ok(priced)
    }

    fn record(
        &self,
        kind: &str,
        descriptor: &ResourceDescriptor,
        result: Result<bool, &PricingError>,
        started: Instant,
    ) {
        let outcome = match result {
            Ok(true) => "ok",
            Ok(_) => "not_found",
            Err(e) => e.kind(),
        };
        if outcome == "not_found" {
            PricingMetrics::record_price_miss(&descriptor.resource_type);
        }
        PricingMetrics::record_estimate(
            kind,
            &descriptor.resource_type,
            outcome,
            started.elapsed().as_secs_f64(),
        );
    }

    fn ec2(&self, sku: &str, tags: &HashMap<String, String>) -> Priced {
        let mut defaults = Defaults::default();
        let platform = canonical_platform(defaults.text(
            tags,
            &["platform", "operatingSystem", "os"],
            "platform",
            "Linux",
        ));
        let tenancy_raw = defaults.text(tags, &["tenancy"], "tenancy", "Shared");
        let tenancy = alias(TENANCIES, tenancy_raw).unwrap_or(tenancy_raw);
        let region = self.pricing.region();
        let footprint = carbon::estimate(
            sku,
            &region,
            carbon::utilization(
                tags::number(tags, &["utilization", "utilization_percentage"]),
                self.utilization,
            ),
            HOURS_PER_MONTH,
        );

        let priced = match self.pricing.ec2_on_demand_hourly(sku, platform, tenancy) {
            Some(rate) => Priced::found(
                rate * HOURS_PER_MONTH,
                format!(
                    "EC2 {sku} on-demand ({platform}, {tenancy} tenancy): ${rate}/hour x {HOURS_PER_MONTH} hours"
                ),
            ),
            None => Priced::not_found(
                format!("EC2 instance type {sku:?} ({platform}, {tenancy})"),
                &region,
            ),
        };
        priced.with_defaults(defaults.0).with_carbon(footprint)
    }

    fn ebs(&self, sku: &str, tags: &HashMap<String, String>) -> Priced {
        let mut defaults = Defaults::default();
        let size = defaults.usage(tags, &["size", "volume_size"], "size_gb", DEFAULT_EBS_SIZE_GB);

        let priced = match self.pricing.ebs_monthly_per_gb(sku) {
            Some(rate) => Priced::found(
                rate * size.value,
                format!("EBS {sku}: ${rate}/GB-month x {} GB", size.value),
            ),
            None => Priced::not_found(format!("EBS volume type {sku:?}"), &self.pricing.region()),
        };
        priced.with_defaults(defaults.0)
    }

    fn rds(&self, sku: &str, tags: &HashMap<String, String>) -> Priced {
        let mut defaults = Defaults::default();
        let engine_raw = defaults.text(tags, &["engine", "databaseEngine"], "engine", "MySQL");
        let engine = alias(RDS_ENGINES, engine_raw).unwrap_or(engine_raw);
        let storage_raw = defaults.text(
            tags,
            &["storage_type", "storage_class"],
            "storage_type",
            "gp2",
        );
        let storage_class = alias(RDS_STORAGE_CLASSES, storage_raw).unwrap_or(storage_raw);
        let size = defaults.usage(
            tags,
            &["allocated_storage", "storage_size"],
            "allocated_storage_gb",
            DEFAULT_RDS_STORAGE_GB,
        );

        let Some(instance_rate) = self.pricing.rds_instance_hourly(sku, engine, RDS_DEPLOYMENT)
        else {
            return Priced::not_found(
                format!("RDS instance class {sku:?} ({engine}, {RDS_DEPLOYMENT})"),
                &self.pricing.region(),
            )
            .with_defaults(defaults.0);
        };

        let compute = instance_rate * HOURS_PER_MONTH;
        let storage_rate = self
            .pricing
            .rds_storage_monthly_per_gb(engine, storage_class)
            .or_else(|| self.pricing.rds_storage_monthly_per_gb("Any", storage_class));

        let detail = match storage_rate {
            Some(rate) => format!(
                "RDS {sku} {engine} {RDS_DEPLOYMENT}: ${instance_rate}/hour x {HOURS_PER_MONTH} hours + {storage_class} storage ${rate}/GB-month x {} GB",
                size.value
            ),
            None => {
                defaults.note(format!(
                    "storage class {storage_class:?} not found in pricing data, storage not charged"
                ));
                format!(
                    "RDS {sku} {engine} {RDS_DEPLOYMENT}: ${instance_rate}/hour x {HOURS_PER_MONTH} hours"
                )
            }
        };
        let storage = storage_rate.map_or(0.0, |rate| rate * size.value);

        Priced::found(compute + storage, detail).with_defaults(defaults.0)
    }

    fn s3(&self, sku: &str, tags: &HashMap<String, String>) -> Priced {
        let mut defaults = Defaults::default();
        let requested = tags::lookup(tags, &["storage_class"]).unwrap_or(sku);
        let class = match alias(S3_STORAGE_CLASSES, requested) {
            Some(class) => class,
            None if self.pricing.s3_monthly_per_gb(requested).is_some() => requested,
            None => {
                defaults.note(format!(
                    "storage_class=STANDARD ({requested:?} is not a storage class)"
                ));
                "Standard"
            }
        };
        let size = defaults.usage(tags, &["size_gb"], "size_gb", 0.0);

        let priced = match self.pricing.s3_monthly_per_gb(class) {
            Some(rate) => Priced::found(
                rate * size.value,
                format!("S3 {class}: ${rate}/GB-month x {} GB", size.value),
            ),
            None => Priced::not_found(format!("S3 storage class {class:?}"), &self.pricing.region()),
        };
        priced.with_defaults(defaults.0)
    }

    fn lambda(&self, tags: &HashMap<String, String>) -> Priced {
        let mut defaults = Defaults::default();
        let requests = defaults.usage(tags, &["requests_per_month"], "requests_per_month", 0.0);
        let duration_ms = defaults.usage(tags, &["avg_duration_ms"], "avg_duration_ms", 0.0);
        let memory_mb = defaults.usage(tags, &["memory_mb"], "memory_mb", DEFAULT_LAMBDA_MEMORY_MB);
        let arch_raw = defaults.text(tags, &["architecture", "arch"], "architecture", "x86_64");
        let architecture = LambdaArchitecture::from_str(arch_raw).unwrap_or_else(|_| {
            defaults.note(format!("architecture=x86_64 ({arch_raw:?} not recognized)"));
            LambdaArchitecture::X86_64
        });

        let Some(rates) = self.pricing.lambda_rates(architecture) else {
            return Priced::not_found(
                format!("Lambda {architecture} rates"),
                &self.pricing.region(),
            )
            .with_defaults(defaults.0);
        };

        let gb_seconds =
            requests.value * (duration_ms.value / 1000.0) * (memory_mb.value / 1024.0);
        let request_rate = rates.request.unwrap_or_else(|| {
            defaults.note("request rate not found in pricing data".to_string());
            0.0
        });
        let gb_second_rate = rates.gb_second.unwrap_or_else(|| {
            defaults.note("duration rate not found in pricing data".to_string());
            0.0
        });

        Priced::found(
            requests.value * request_rate + gb_seconds * gb_second_rate,
            format!(
                "Lambda {architecture}: {} requests x ${request_rate} + {gb_seconds} GB-s x ${gb_second_rate}",
                requests.value
            ),
        )
        .with_defaults(defaults.0)
    }

    fn dynamodb(&self, sku: &str, tags: &HashMap<String, String>) -> Priced {
        let mut defaults = Defaults::default();
        let mode = tags::lookup(tags, &["billing_mode"])
            .unwrap_or(sku)
            .to_ascii_lowercase();
        let provisioned = if mode.contains("provision") {
            true
        } else {
            if !mode.contains("demand") && !mode.contains("pay_per_request") {
                defaults.note("billing_mode=on-demand".to_string());
            }
            false
        };

        let rates = self.pricing.dynamodb_rates();
        if rates == Default::default() {
            return Priced::not_found("DynamoDB rates".to_string(), &self.pricing.region())
                .with_defaults(defaults.0);
        }

        let mut component = |usage: &Usage, rate: Option<f64>, label: &str| -> f64 {
            match rate {
                Some(rate) => usage.value * rate,
                None => {
                    if usage.value > 0.0 {
                        defaults.0.push(format!("{label} rate not found in pricing data"));
                    }
                    0.0
                }
            }
        };

        let storage_gb = tags::usage(tags, &["storage_gb", "size_gb"], 0.0);
        let (cost, detail) = if provisioned {
            let rcu = tags::usage(tags, &["read_capacity_units", "rcu"], 0.0);
            let wcu = tags::usage(tags, &["write_capacity_units", "wcu"], 0.0);
            let throughput = (component(&rcu, rates.provisioned_rcu_hourly, "RCU")
                + component(&wcu, rates.provisioned_wcu_hourly, "WCU"))
                * HOURS_PER_MONTH;
            let storage = component(&storage_gb, rates.storage_per_gb_month, "storage");
            (
                throughput + storage,
                format!(
                    "DynamoDB provisioned: ({rcu} RCU + {wcu} WCU) x {HOURS_PER_MONTH} hours + {storage_gb} GB storage"
                ),
            )
        } else {
            let reads = tags::usage(tags, &["read_requests_per_month", "read_request_units"], 0.0);
            let writes =
                tags::usage(tags, &["write_requests_per_month", "write_request_units"], 0.0);
            let cost = component(&reads, rates.on_demand_read, "read")
                + component(&writes, rates.on_demand_write, "write")
                + component(&storage_gb, rates.storage_per_gb_month, "storage");
            (
                cost,
                format!(
                    "DynamoDB on-demand: {reads} reads + {writes} writes + {storage_gb} GB storage"
                ),
            )
        };

        Priced::found(cost, detail).with_defaults(defaults.0)
    }

    fn eks(&self, tags: &HashMap<String, String>) -> Priced {
        let mut defaults = Defaults::default();
        let raw = defaults.text(tags, &["support_type"], "support_type", "standard");
        let tier = EksSupportTier::from_str(raw).unwrap_or_else(|_| {
            defaults.note(format!("support_type=standard ({raw:?} not recognized)"));
            EksSupportTier::Standard
        });

        let priced = match self.pricing.eks_cluster_hourly(tier) {
            Some(rate) => Priced::found(
                rate * HOURS_PER_MONTH,
                format!("EKS cluster ({tier} support): ${rate}/hour x {HOURS_PER_MONTH} hours"),
            ),
            None => Priced::not_found(format!("EKS {tier} support"), &self.pricing.region()),
        };
        priced.with_defaults(defaults.0)
    }

    fn load_balancer(
        &self,
        resource_type: &str,
        sku: &str,
        tags: &HashMap<String, String>,
    ) -> Priced {
        let mut defaults = Defaults::default();
        // `alb` / `nlb` resource types name the class; `elb` leaves it to the sku or tags
        let class = LoadBalancerClass::from_str(resource_type.trim())
            .or_else(|_| LoadBalancerClass::from_str(sku))
            .ok()
            .or_else(|| {
                tags::lookup(tags, &["load_balancer_type", "lb_type"])
                    .and_then(|raw| LoadBalancerClass::from_str(raw).ok())
            })
            .unwrap_or_else(|| {
                defaults.note("load_balancer_type=application".to_string());
                LoadBalancerClass::Application
            });

        let unit_key = match class {
            LoadBalancerClass::Application => "lcu_per_hour",
            LoadBalancerClass::Network => "nlcu_per_hour",
        };
        let units = match tags::usage(tags, &[unit_key], 0.0) {
            specific if !specific.is_defaulted() => specific,
            specific => {
                if let UsageOrigin::Invalid { raw, .. } = &specific.origin {
                    defaults.note(format!("{unit_key}={raw:?} is not a number"));
                }
                defaults.usage(tags, &["capacity_units"], unit_key, 0.0)
            }
        };

        let Some(rates) = self.pricing.load_balancer_rates(class) else {
            return Priced::not_found(format!("{class} load balancer rates"), &self.pricing.region())
                .with_defaults(defaults.0);
        };

        let fixed = rates.fixed_hourly.unwrap_or_else(|| {
            defaults.note("hourly rate not found in pricing data".to_string());
            0.0
        });
        let capacity = rates.capacity_unit_hourly.unwrap_or_else(|| {
            if units.value > 0.0 {
                defaults.note(format!(
                    "{} rate not found in pricing data",
                    class.capacity_unit()
                ));
            }
            0.0
        });

        Priced::found(
            fixed * HOURS_PER_MONTH + capacity * units.value * HOURS_PER_MONTH,
            format!(
                "{class} load balancer: ${fixed}/hour x {HOURS_PER_MONTH} hours + {} {} x ${capacity}/hour x {HOURS_PER_MONTH} hours",
                units.value,
                class.capacity_unit()
            ),
        )
        .with_defaults(defaults.0)
    }
}
