//! Ambient network lookup

use crate::error::{CloudError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Default network a deployment is placed into
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkContext {
    pub vpc_id: String,
    pub subnet_ids: Vec<String>,
}

impl NetworkContext {
    /// Validated context; a network without subnets cannot host anything
    pub fn new(vpc_id: impl Into<String>, subnet_ids: Vec<String>) -> Result<Self> {
        let vpc_id = vpc_id.into();
        if vpc_id.is_empty() {
            return Err(CloudError::NetworkResolution(
                "default VPC has no id".to_string(),
            ));
        }
        if subnet_ids.is_empty() {
            return Err(CloudError::NetworkResolution(format!(
                "default VPC {} has no subnets",
                vpc_id
            )));
        }
        Ok(Self { vpc_id, subnet_ids })
    }
}

/// Resolves the default network of the target environment
///
/// Failures are surfaced as-is; implementations must not retry.
#[async_trait]
pub trait NetworkResolver: Send + Sync {
    async fn resolve_default(&self) -> Result<NetworkContext>;
}

/// Resolver returning a fixed context (or a fixed failure)
#[derive(Debug, Clone)]
pub struct StaticNetwork {
    context: Option<NetworkContext>,
}

impl StaticNetwork {
    pub fn new(context: NetworkContext) -> Self {
        Self {
            context: Some(context),
        }
    }

    /// Environment without a default network
    pub fn missing() -> Self {
        Self { context: None }
    }
}

#[async_trait]
impl NetworkResolver for StaticNetwork {
    async fn resolve_default(&self) -> Result<NetworkContext> {
        self.context
            .clone()
            .ok_or_else(|| CloudError::NetworkResolution("no default VPC found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_requires_subnets() {
        let err = NetworkContext::new("vpc-123", Vec::new()).unwrap_err();
        assert!(matches!(err, CloudError::NetworkResolution(_)));
        assert!(NetworkContext::new("vpc-123", vec!["subnet-a".to_string()]).is_ok());
    }

    #[tokio::test]
    async fn test_static_network() {
        let context = NetworkContext::new("vpc-123", vec!["subnet-a".to_string()]).unwrap();
        let resolved = StaticNetwork::new(context.clone())
            .resolve_default()
            .await
            .unwrap();
        assert_eq!(resolved, context);

        let err = StaticNetwork::missing().resolve_default().await.unwrap_err();
        assert!(err.to_string().contains("no default VPC"));
    }
}
