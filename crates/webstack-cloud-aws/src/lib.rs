//! AWS support for webstack
//!
//! Resolves the ambient default VPC and its subnets through the EC2 API.

pub mod error;
pub mod network;

pub use error::{AwsError, Result};
pub use network::Ec2NetworkResolver;
