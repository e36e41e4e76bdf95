//! Synthetic AWS Price List documents.
//!
//! Produces the same JSON shape the public bulk API serves
//! (`products` keyed by SKU plus `terms.OnDemand`), so tests exercise the real
//! decoding path without network access or multi-gigabyte fixtures.

use serde_json::{Map, Value, json};

/// Offer term code used for every generated on-demand term
pub const ON_DEMAND_TERM_CODE: &str = "JRTCKXETXF";
/// Rate code suffix used for every generated price dimension
pub const RATE_CODE: &str = "6YS6EN2CT7";

/// Builder for one price list document
#[derive(Debug, Clone)]
pub struct CatalogBuilder {
    offer_code: String,
    publication_date: String,
    products: Map<String, Value>,
    on_demand: Map<String, Value>,
    next_sku: usize,
}

impl CatalogBuilder {
    /// Document for a single service, e.g. `AmazonEC2`
    pub fn new(offer_code: &str) -> Self {
        Self {
            offer_code: offer_code.to_string(),
            publication_date: "2025-01-01T00:00:00Z".to_string(),
            products: Map::new(),
            on_demand: Map::new(),
            next_sku: 0,
        }
    }

    /// Document spanning several services, routed per product by `servicecode`
    pub fn combined() -> Self {
        Self::new("Combined")
    }

    fn next_sku(&mut self) -> String {
        self.next_sku += 1;
        format!("SKU{:06}", self.next_sku)
    }

    /// Add a product with an optional single on-demand dimension `(unit, USD price)`.
    pub fn product(
        mut self,
        family: &str,
        attributes: &[(&str, &str)],
        price: Option<(&str, &str)>,
    ) -> Self {
        let sku = self.next_sku();
        let attributes: Map<String, Value> = attributes
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect();

        self.products.insert(
            sku.clone(),
            json!({
                "sku": sku,
                "productFamily": family,
                "attributes": attributes,
            }),
        );

        if let Some((unit, usd)) = price {
            self = self.dimensions(&sku, &[("0", unit, usd)]);
        }
        self
    }

    /// On-demand terms for `sku` with several `(beginRange, unit, USD price)` tiers.
    pub fn dimensions(mut self, sku: &str, tiers: &[(&str, &str, &str)]) -> Self {
        let term_key = format!("{sku}.{ON_DEMAND_TERM_CODE}");
        let dimensions: Map<String, Value> = tiers
            .iter()
            .enumerate()
            .map(|(i, (begin, unit, usd))| {
                (
                    format!("{term_key}.{RATE_CODE}{i}"),
                    json!({
                        "unit": unit,
                        "beginRange": begin,
                        "endRange": "Inf",
                        "pricePerUnit": { "USD": usd },
                        "description": format!("{usd} per {unit}"),
                    }),
                )
            })
            .collect();

        let mut terms = Map::new();
        terms.insert(
            term_key,
            json!({
                "offerTermCode": ON_DEMAND_TERM_CODE,
                "sku": sku,
                "effectiveDate": self.publication_date,
                "priceDimensions": dimensions,
            }),
        );
        self.on_demand.insert(sku.to_string(), Value::Object(terms));
        self
    }

    /// Insert a product value verbatim, for malformed-entry tests.
    pub fn raw_product(mut self, sku: &str, value: Value) -> Self {
        self.products.insert(sku.to_string(), value);
        self
    }

    /// Insert a term value verbatim, for malformed-term tests.
    pub fn raw_terms(mut self, sku: &str, value: Value) -> Self {
        self.on_demand.insert(sku.to_string(), value);
        self
    }

    /// SKU the next product will receive
    pub fn peek_sku(&self) -> String {
        format!("SKU{:06}", self.next_sku + 1)
    }

    pub fn ec2_instance(self, instance_type: &str, os: &str, tenancy: &str, hourly: f64) -> Self {
        self.product(
            "Compute Instance",
            &[
                ("servicecode", "AmazonEC2"),
                ("instanceType", instance_type),
                ("operatingSystem", os),
                ("tenancy", tenancy),
                ("capacitystatus", "Used"),
                ("preInstalledSw", "NA"),
                ("licenseModel", "No License required"),
                ("location", "US East (N. Virginia)"),
            ],
            Some(("Hrs", price(hourly).as_str())),
        )
    }

    pub fn ebs_volume(self, volume_api_name: &str, per_gb_month: f64) -> Self {
        self.product(
            "Storage",
            &[
                ("servicecode", "AmazonEC2"),
                ("volumeApiName", volume_api_name),
                ("location", "US East (N. Virginia)"),
            ],
            Some(("GB-Mo", price(per_gb_month).as_str())),
        )
    }

    pub fn rds_instance(self, class: &str, engine: &str, deployment: &str, hourly: f64) -> Self {
        self.product(
            "Database Instance",
            &[
                ("servicecode", "AmazonRDS"),
                ("instanceType", class),
                ("databaseEngine", engine),
                ("deploymentOption", deployment),
            ],
            Some(("Hrs", price(hourly).as_str())),
        )
    }

    pub fn rds_storage(self, engine: &str, volume_type: &str, per_gb_month: f64) -> Self {
        self.product(
            "Database Storage",
            &[
                ("servicecode", "AmazonRDS"),
                ("databaseEngine", engine),
                ("volumeType", volume_type),
                ("deploymentOption", "Single-AZ"),
            ],
            Some(("GB-Mo", price(per_gb_month).as_str())),
        )
    }

    pub fn s3_storage(self, volume_type: &str, per_gb_month: f64) -> Self {
        self.product(
            "Storage",
            &[
                ("servicecode", "AmazonS3"),
                ("volumeType", volume_type),
                ("storageClass", "General Purpose"),
            ],
            Some(("GB-Mo", price(per_gb_month).as_str())),
        )
    }

    /// `group` is one of the `AWS-Lambda-*` usage groups
    pub fn lambda(self, group: &str, unit: &str, rate: f64) -> Self {
        self.product(
            "Serverless",
            &[("servicecode", "AWSLambda"), ("group", group)],
            Some((unit, price(rate).as_str())),
        )
    }

    pub fn eks_cluster(self, usage_type: &str, hourly: f64) -> Self {
        self.product(
            "Compute",
            &[("servicecode", "AmazonEKS"), ("usagetype", usage_type)],
            Some(("Hrs", price(hourly).as_str())),
        )
    }

    pub fn dynamodb(self, family: &str, group: &str, usage_type: &str, rate: f64) -> Self {
        self.product(
            family,
            &[
                ("servicecode", "AmazonDynamoDB"),
                ("group", group),
                ("usagetype", usage_type),
            ],
            Some(("Units", price(rate).as_str())),
        )
    }

    pub fn load_balancer(self, family: &str, unit: &str, usage_type: &str, hourly: f64) -> Self {
        self.product(
            family,
            &[("servicecode", "AWSELB"), ("usagetype", usage_type)],
            Some((unit, price(hourly).as_str())),
        )
    }

    /// The document as a JSON value
    pub fn build(&self) -> Value {
        json!({
            "formatVersion": "v1.0",
            "disclaimer": "Synthetic price list for tests",
            "offerCode": self.offer_code,
            "version": "20250101000000",
            "publicationDate": self.publication_date,
            "products": self.products,
            "terms": { "OnDemand": self.on_demand },
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.build().to_string().into_bytes()
    }
}

/// USD price string the way the bulk API formats it
pub fn price(value: f64) -> String {
    format!("{value:.10}")
}

/// Reference prices of the `us_east_1_catalog` fixture
pub mod reference {
    pub const T3_MICRO_LINUX: f64 = 0.0104;
    pub const T3_SMALL_LINUX: f64 = 0.0208;
    pub const T3_MICRO_WINDOWS: f64 = 0.0196;
    pub const T2_MICRO_LINUX: f64 = 0.0116;
    pub const M5_LARGE_LINUX: f64 = 0.096;
    pub const M6I_LARGE_LINUX: f64 = 0.096;
    pub const M6G_LARGE_LINUX: f64 = 0.077;
    pub const GP2_GB_MONTH: f64 = 0.10;
    pub const GP3_GB_MONTH: f64 = 0.08;
    pub const S3_STANDARD_GB_MONTH: f64 = 0.023;
    pub const RDS_T3_MICRO_MYSQL: f64 = 0.017;
    pub const RDS_GP2_GB_MONTH: f64 = 0.115;
    pub const LAMBDA_REQUEST: f64 = 0.0000002;
    pub const LAMBDA_GB_SECOND: f64 = 0.0000166667;
    pub const EKS_STANDARD_HOURLY: f64 = 0.10;
    pub const EKS_EXTENDED_HOURLY: f64 = 0.60;
    pub const ALB_HOURLY: f64 = 0.0225;
    pub const ALB_LCU_HOURLY: f64 = 0.008;
    pub const NLB_HOURLY: f64 = 0.0225;
    pub const NLB_NLCU_HOURLY: f64 = 0.006;
    pub const DYNAMODB_READ_REQUEST: f64 = 0.00000025;
    pub const DYNAMODB_WRITE_REQUEST: f64 = 0.00000125;
    pub const DYNAMODB_STORAGE_GB_MONTH: f64 = 0.25;
    pub const DYNAMODB_RCU_HOURLY: f64 = 0.00013;
    pub const DYNAMODB_WCU_HOURLY: f64 = 0.00065;
}

/// Combined us-east-1 document covering every indexed service, plus entries
/// each service filter must reject.
pub fn us_east_1_catalog() -> CatalogBuilder {
    use reference::*;

    CatalogBuilder::combined()
        // EC2 compute
        .ec2_instance("t3.micro", "Linux", "Shared", T3_MICRO_LINUX)
        .ec2_instance("t3.small", "Linux", "Shared", T3_SMALL_LINUX)
        .ec2_instance("t3.micro", "Windows", "Shared", T3_MICRO_WINDOWS)
        .ec2_instance("t3.micro", "Linux", "Dedicated", 0.0130)
        .ec2_instance("t2.micro", "Linux", "Shared", T2_MICRO_LINUX)
        .ec2_instance("t4g.micro", "Linux", "Shared", 0.0084)
        .ec2_instance("m5.large", "Linux", "Shared", M5_LARGE_LINUX)
        .ec2_instance("m6i.large", "Linux", "Shared", M6I_LARGE_LINUX)
        .ec2_instance("m6g.large", "Linux", "Shared", M6G_LARGE_LINUX)
        .ec2_instance("m7g.large", "Linux", "Shared", 0.0816)
        .ec2_instance("c5.large", "Linux", "Shared", 0.085)
        .ec2_instance("c6i.large", "Linux", "Shared", 0.085)
        .ec2_instance("c6g.large", "Linux", "Shared", 0.068)
        .ec2_instance("r5.large", "Red Hat Enterprise Linux", "Shared", 0.186)
        // EC2 rows the filter must drop
        .product(
            "Compute Instance",
            &[
                ("servicecode", "AmazonEC2"),
                ("instanceType", "t3.micro"),
                ("operatingSystem", "Linux"),
                ("tenancy", "Shared"),
                ("capacitystatus", "UnusedCapacityReservation"),
                ("preInstalledSw", "NA"),
            ],
            Some(("Hrs", "0.0001000000")),
        )
        .product(
            "Compute Instance",
            &[
                ("servicecode", "AmazonEC2"),
                ("instanceType", "t3.micro"),
                ("operatingSystem", "Windows"),
                ("tenancy", "Shared"),
                ("capacitystatus", "Used"),
                ("preInstalledSw", "SQL Std"),
            ],
            Some(("Hrs", "0.9999000000")),
        )
        .product(
            "Compute Instance",
            &[
                ("servicecode", "AmazonEC2"),
                ("instanceType", "t3.micro"),
                ("operatingSystem", "Windows"),
                ("tenancy", "Shared"),
                ("capacitystatus", "Used"),
                ("preInstalledSw", "NA"),
                ("licenseModel", "Bring your own license"),
            ],
            Some(("Hrs", "0.0001000000")),
        )
        .product(
            "Data Transfer",
            &[("servicecode", "AmazonEC2"), ("transferType", "InterRegion Outbound")],
            Some(("GB", "0.0200000000")),
        )
        // EBS
        .ebs_volume("gp3", GP3_GB_MONTH)
        .ebs_volume("gp2", GP2_GB_MONTH)
        .ebs_volume("io1", 0.125)
        .ebs_volume("st1", 0.045)
        // RDS
        .rds_instance("db.t3.micro", "MySQL", "Single-AZ", RDS_T3_MICRO_MYSQL)
        .rds_instance("db.t3.micro", "PostgreSQL", "Single-AZ", 0.018)
        .rds_instance("db.t3.micro", "MySQL", "Multi-AZ", 0.034)
        .rds_storage("MySQL", "General Purpose", RDS_GP2_GB_MONTH)
        .rds_storage("PostgreSQL", "General Purpose", RDS_GP2_GB_MONTH)
        .rds_storage("Any", "General Purpose-GP3", 0.115)
        // S3
        .s3_storage("Standard", S3_STANDARD_GB_MONTH)
        .s3_storage("Standard - Infrequent Access", 0.0125)
        .s3_storage("Amazon Glacier", 0.0036)
        // Lambda
        .lambda("AWS-Lambda-Requests", "Requests", LAMBDA_REQUEST)
        .lambda("AWS-Lambda-Duration", "Lambda-GB-Second", LAMBDA_GB_SECOND)
        .lambda("AWS-Lambda-Requests-ARM", "Requests", LAMBDA_REQUEST)
        .lambda("AWS-Lambda-Duration-ARM", "Lambda-GB-Second", 0.0000133334)
        .lambda("AWS-Lambda-Provisioned-Concurrency", "Lambda-GB-Second", 0.0000041667)
        // EKS
        .eks_cluster("USE1-AmazonEKS-Hours:perCluster", EKS_STANDARD_HOURLY)
        .eks_cluster("USE1-AmazonEKS-ExtendedSupport:perCluster", EKS_EXTENDED_HOURLY)
        // DynamoDB
        .dynamodb(
            "Amazon DynamoDB PayPerRequest Throughput",
            "DDB-ReadUnits",
            "USE1-ReadRequestUnits",
            DYNAMODB_READ_REQUEST,
        )
        .dynamodb(
            "Amazon DynamoDB PayPerRequest Throughput",
            "DDB-WriteUnits",
            "USE1-WriteRequestUnits",
            DYNAMODB_WRITE_REQUEST,
        )
        .dynamodb(
            "Provisioned IOPS",
            "DDB-ReadUnits",
            "USE1-ReadCapacityUnit-Hrs",
            DYNAMODB_RCU_HOURLY,
        )
        .dynamodb(
            "Provisioned IOPS",
            "DDB-WriteUnits",
            "USE1-WriteCapacityUnit-Hrs",
            DYNAMODB_WCU_HOURLY,
        )
        .dynamodb(
            "Database Storage",
            "",
            "USE1-TimedStorage-ByteHrs",
            DYNAMODB_STORAGE_GB_MONTH,
        )
        .dynamodb("Database Storage", "", "USE1-IA-TimedStorage-ByteHrs", 0.10)
        // Load balancers
        .load_balancer(
            "Load Balancer-Application",
            "Hrs",
            "USE1-LoadBalancerUsage",
            ALB_HOURLY,
        )
        .load_balancer(
            "Load Balancer-Application",
            "LCU-Hrs",
            "USE1-LCUUsage",
            ALB_LCU_HOURLY,
        )
        .load_balancer(
            "Load Balancer-Network",
            "Hrs",
            "USE1-LoadBalancerUsage",
            NLB_HOURLY,
        )
        .load_balancer(
            "Load Balancer-Network",
            "NLCU-Hrs",
            "USE1-LCUUsage",
            NLB_NLCU_HOURLY,
        )
        // Product of a service nothing indexes
        .product(
            "Queue",
            &[("servicecode", "AWSQueueService")],
            Some(("Requests", "0.0000004000")),
        )
}
