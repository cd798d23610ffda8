//! AWS resolver error types

use thiserror::Error;
use webstack_cloud::CloudError;

#[derive(Error, Debug)]
pub enum AwsError {
    #[error("{operation} failed: {message}")]
    Api {
        operation: &'static str,
        message: String,
    },

    #[error("no default VPC in region {0}")]
    NoDefaultVpc(String),

    #[error("default VPC {0} has no subnets")]
    NoSubnets(String),
}

impl From<AwsError> for CloudError {
    fn from(err: AwsError) -> Self {
        CloudError::NetworkResolution(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AwsError>;
