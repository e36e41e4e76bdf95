//! Amazon Resource Name parsing.

use serde::Serialize;
use std::str::FromStr;
use strum::{Display, EnumString};

use crate::error::{PricingError, PricingResult};

/// AWS partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString, Hash)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Partition {
    Aws,
    AwsCn,
    AwsUsGov,
    AwsIso,
    AwsIsoB,
}

impl Partition {
    /// Air-gapped partitions have no public price list.
    pub fn is_isolated(&self) -> bool {
        matches!(self, Partition::AwsIso | Partition::AwsIsoB)
    }
}

/// Services whose ARNs carry no region
const GLOBAL_SERVICES: &[&str] = &["s3", "iam", "cloudfront", "route53"];

/// Components of `arn:partition:service:region:account:resource`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedResourceIdentifier {
    pub partition: Partition,
    pub service: String,
    /// Empty for global services
    pub region: String,
    /// Empty for some services (S3 buckets)
    pub account_id: String,
    pub resource_kind: String,
    pub resource_id: String,
}

impl ParsedResourceIdentifier {
    pub fn parse(arn: &str) -> PricingResult<Self> {
        let parts: Vec<&str> = arn.splitn(6, ':').collect();
        if parts.len() < 6 {
            return Err(PricingError::invalid_identifier(
                arn,
                format!("expected 6 colon-separated segments, found {}", parts.len()),
            ));
        }
        if parts[0] != "arn" {
            return Err(PricingError::invalid_identifier(arn, "must start with 'arn:'"));
        }

        let partition = Partition::from_str(parts[1]).map_err(|_| {
            PricingError::invalid_identifier(arn, format!("unknown partition '{}'", parts[1]))
        })?;
        if partition.is_isolated() {
            return Err(PricingError::invalid_identifier(
                arn,
                "isolated partitions (aws-iso, aws-iso-b) do not have public pricing data",
            ));
        }

        let service = parts[2];
        if service.is_empty() {
            return Err(PricingError::invalid_identifier(arn, "service is empty"));
        }
        let resource = parts[5];
        if resource.is_empty() {
            return Err(PricingError::invalid_identifier(arn, "resource is empty"));
        }

        let (resource_kind, resource_id) = resource.split_once(['/', ':']).unwrap_or((resource, ""));

        Ok(Self {
            partition,
            service: service.to_string(),
            region: parts[3].to_string(),
            account_id: parts[4].to_string(),
            resource_kind: resource_kind.to_string(),
            resource_id: resource_id.to_string(),
        })
    }

    /// Canonical resource type for the estimator; unknown services pass through.
    pub fn canonical_resource_type(&self) -> String {
        match (self.service.as_str(), self.resource_kind.as_str()) {
            ("ec2", "volume") => "ebs".to_string(),
            ("ec2", _) => "ec2".to_string(),
            ("elasticloadbalancing", _) => "elb".to_string(),
            (service, _) => service.to_string(),
        }
    }

    pub fn is_global_service(&self) -> bool {
        GLOBAL_SERVICES.contains(&self.service.as_str())
    }
}

impl FromStr for ParsedResourceIdentifier {
    type Err = PricingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(arn: &str) -> ParsedResourceIdentifier {
        ParsedResourceIdentifier::parse(arn).unwrap()
    }

    #[test]
    fn test_parse_valid_arns() {
        let cases = [
            ("arn:aws:ec2:us-east-1:123456789012:instance/i-abc123", Partition::Aws, "ec2", "us-east-1", "instance", "i-abc123"),
            ("arn:aws:ec2:us-west-2:123456789012:volume/vol-xyz789", Partition::Aws, "ec2", "us-west-2", "volume", "vol-xyz789"),
            ("arn:aws:rds:eu-west-1:123456789012:db:mydb", Partition::Aws, "rds", "eu-west-1", "db", "mydb"),
            ("arn:aws:lambda:ap-northeast-1:123456789012:function:my-function", Partition::Aws, "lambda", "ap-northeast-1", "function", "my-function"),
            ("arn:aws:dynamodb:us-east-1:123456789012:table/my-table", Partition::Aws, "dynamodb", "us-east-1", "table", "my-table"),
            ("arn:aws:eks:us-east-1:123456789012:cluster/my-cluster", Partition::Aws, "eks", "us-east-1", "cluster", "my-cluster"),
            ("arn:aws-cn:ec2:cn-north-1:123456789012:instance/i-abc123", Partition::AwsCn, "ec2", "cn-north-1", "instance", "i-abc123"),
            ("arn:aws-us-gov:ec2:us-gov-west-1:123456789012:instance/i-abc123", Partition::AwsUsGov, "ec2", "us-gov-west-1", "instance", "i-abc123"),
        ];

        for (arn, partition, service, region, kind, id) in cases {
            let parsed = parse(arn);
            assert_eq!(parsed.partition, partition, "{arn}");
            assert_eq!(parsed.service, service, "{arn}");
            assert_eq!(parsed.region, region, "{arn}");
            assert_eq!(parsed.account_id, "123456789012", "{arn}");
            assert_eq!(parsed.resource_kind, kind, "{arn}");
            assert_eq!(parsed.resource_id, id, "{arn}");
        }
    }

    #[test]
    fn test_s3_bucket_is_global_with_empty_region() {
        let parsed = parse("arn:aws:s3:::my-bucket-name");
        assert_eq!(parsed.region, "");
        assert_eq!(parsed.account_id, "");
        assert_eq!(parsed.resource_kind, "my-bucket-name");
        assert_eq!(parsed.resource_id, "");
        assert!(parsed.is_global_service());
        assert_eq!(parsed.canonical_resource_type(), "s3");
    }

    #[test]
    fn test_resource_may_contain_colons() {
        let parsed = parse("arn:aws:elasticloadbalancing:us-east-1:123456789012:loadbalancer/app/my-alb/50dc6c495c0c9188");
        assert_eq!(parsed.resource_kind, "loadbalancer");
        assert_eq!(parsed.resource_id, "app/my-alb/50dc6c495c0c9188");
        assert_eq!(parsed.canonical_resource_type(), "elb");

        let parsed = parse("arn:aws:logs:us-east-1:123456789012:log-group:/aws/lambda/x:*");
        assert_eq!(parsed.resource_kind, "log-group");
        assert_eq!(parsed.resource_id, "/aws/lambda/x:*");
    }

    #[test]
    fn test_invalid_arns() {
        for arn in [
            "arn:aws:ec2",
            "urn:aws:ec2:us-east-1:123456789012:instance/i-abc",
            "arn:invalid:ec2:us-east-1:123456789012:instance/i-abc",
            "arn:aws::us-east-1:123456789012:instance/i-abc",
            "arn:aws:ec2:us-east-1:123456789012:",
        ] {
            let err = ParsedResourceIdentifier::parse(arn).unwrap_err();
            assert!(
                matches!(&err, PricingError::InvalidIdentifier { identifier, .. } if identifier == arn),
                "{arn}: {err}"
            );
        }
    }

    #[test]
    fn test_isolated_partitions_rejected_with_reason() {
        for arn in [
            "arn:aws-iso:ec2:us-iso-east-1:123456789012:instance/i-abc123",
            "arn:aws-iso-b:ec2:us-isob-east-1:123456789012:instance/i-abc123",
        ] {
            let err = ParsedResourceIdentifier::parse(arn).unwrap_err();
            assert!(err.to_string().contains(
                "isolated partitions (aws-iso, aws-iso-b) do not have public pricing data"
            ));
        }
    }

    #[test]
    fn test_from_str() {
        let parsed: ParsedResourceIdentifier = "arn:aws:ec2:us-east-1:123456789012:instance/i-1"
            .parse()
            .unwrap();
        assert_eq!(parsed.resource_id, "i-1");
    }

    #[test]
    fn test_canonical_resource_types() {
        let with = |service: &str, kind: &str| ParsedResourceIdentifier {
            partition: Partition::Aws,
            service: service.to_string(),
            region: String::new(),
            account_id: String::new(),
            resource_kind: kind.to_string(),
            resource_id: String::new(),
        };
        assert_eq!(with("ec2", "instance").canonical_resource_type(), "ec2");
        assert_eq!(with("ec2", "volume").canonical_resource_type(), "ebs");
        assert_eq!(with("rds", "db").canonical_resource_type(), "rds");
        assert_eq!(with("lambda", "function").canonical_resource_type(), "lambda");
        assert_eq!(with("dynamodb", "table").canonical_resource_type(), "dynamodb");
        assert_eq!(with("eks", "cluster").canonical_resource_type(), "eks");
        assert_eq!(with("kinesis", "stream").canonical_resource_type(), "kinesis");
        assert!(!with("ec2", "instance").is_global_service());
        assert!(with("route53", "hostedzone").is_global_service());
    }
}
