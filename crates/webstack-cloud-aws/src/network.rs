//! Default VPC lookup via EC2

use crate::error::{AwsError, Result};
use async_trait::async_trait;
use aws_sdk_ec2::error::DisplayErrorContext;
use aws_sdk_ec2::types::{Filter, Subnet, Vpc};
use webstack_cloud::{NetworkContext, NetworkResolver};

/// [`NetworkResolver`] backed by `DescribeVpcs` / `DescribeSubnets`
pub struct Ec2NetworkResolver {
    client: aws_sdk_ec2::Client,
    region: String,
}

impl Ec2NetworkResolver {
    pub fn new(client: aws_sdk_ec2::Client, region: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
        }
    }

    /// Build a client from the ambient AWS credentials, pinned to `region`
    pub async fn from_env(region: impl Into<String>) -> Self {
        let region = region.into();
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.clone()))
            .load()
            .await;
        Self::new(aws_sdk_ec2::Client::new(&config), region)
    }

    async fn default_vpc_id(&self) -> Result<String> {
        tracing::debug!("Looking up default VPC in {}", self.region);
        let output = self
            .client
            .describe_vpcs()
            .filters(Filter::builder().name("isDefault").values("true").build())
            .send()
            .await
            .map_err(|e| AwsError::Api {
                operation: "DescribeVpcs",
                message: DisplayErrorContext(&e).to_string(),
            })?;

        pick_default_vpc(output.vpcs(), &self.region)
    }

    async fn subnet_ids(&self, vpc_id: &str) -> Result<Vec<String>> {
        tracing::debug!("Listing subnets of {}", vpc_id);
        let output = self
            .client
            .describe_subnets()
            .filters(Filter::builder().name("vpc-id").values(vpc_id).build())
            .send()
            .await
            .map_err(|e| AwsError::Api {
                operation: "DescribeSubnets",
                message: DisplayErrorContext(&e).to_string(),
            })?;

        collect_subnet_ids(output.subnets(), vpc_id)
    }
}

#[async_trait]
impl NetworkResolver for Ec2NetworkResolver {
    async fn resolve_default(&self) -> webstack_cloud::Result<NetworkContext> {
        let vpc_id = self.default_vpc_id().await?;
        let subnet_ids = self.subnet_ids(&vpc_id).await?;
        NetworkContext::new(vpc_id, subnet_ids)
    }
}

fn pick_default_vpc(vpcs: &[Vpc], region: &str) -> Result<String> {
    vpcs.iter()
        .filter(|v| v.is_default().unwrap_or(false))
        .find_map(|v| v.vpc_id().map(str::to_string))
        .ok_or_else(|| AwsError::NoDefaultVpc(region.to_string()))
}

/// Subnet ids in a stable order, so repeated lookups compose identical graphs
fn collect_subnet_ids(subnets: &[Subnet], vpc_id: &str) -> Result<Vec<String>> {
    let mut ids: Vec<String> = subnets
        .iter()
        .filter_map(|s| s.subnet_id().map(str::to_string))
        .collect();
    ids.sort();
    ids.dedup();

    if ids.is_empty() {
        return Err(AwsError::NoSubnets(vpc_id.to_string()));
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use webstack_cloud::CloudError;

    #[test]
    fn test_pick_default_vpc() {
        let vpcs = [
            Vpc::builder().vpc_id("vpc-custom").is_default(false).build(),
            Vpc::builder().vpc_id("vpc-default").is_default(true).build(),
        ];
        assert_eq!(pick_default_vpc(&vpcs, "us-west-2").unwrap(), "vpc-default");
    }

    #[test]
    fn test_no_default_vpc() {
        let vpcs = [Vpc::builder().vpc_id("vpc-custom").is_default(false).build()];
        let err = pick_default_vpc(&vpcs, "us-west-2").unwrap_err();
        assert!(matches!(err, AwsError::NoDefaultVpc(_)));

        let err: CloudError = err.into();
        assert!(matches!(err, CloudError::NetworkResolution(_)));
        assert!(err.to_string().contains("us-west-2"));
    }

    #[test]
    fn test_subnet_ids_are_sorted() {
        let subnets = [
            Subnet::builder().subnet_id("subnet-c").build(),
            Subnet::builder().subnet_id("subnet-a").build(),
            Subnet::builder().subnet_id("subnet-a").build(),
            Subnet::builder().build(),
        ];
        assert_eq!(
            collect_subnet_ids(&subnets, "vpc-1").unwrap(),
            vec!["subnet-a", "subnet-c"]
        );
    }

    #[test]
    fn test_vpc_without_subnets() {
        let err = collect_subnet_ids(&[], "vpc-1").unwrap_err();
        assert_eq!(err.to_string(), "default VPC vpc-1 has no subnets");
    }
}
