//! Deployment input and result types

use serde::{Deserialize, Serialize};
use webstack_cloud::{AttrRef, CloudError, ResourceGraph, Result};

const MAX_NAME_LEN: usize = 24;

/// What the caller wants deployed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDeploymentSpec")]
pub struct DeploymentSpec {
    name: String,
    image: String,
}

impl DeploymentSpec {
    /// Validate and build a spec
    ///
    /// The name prefixes every physical resource name, so it is limited to
    /// lowercase letters, digits and inner dashes. The image reference is used
    /// verbatim; whether it can be pulled is only known once containers start.
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let image = image.into();
        validate_name(&name)?;
        validate_image(&image)?;
        Ok(Self { name, image })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image(&self) -> &str {
        &self.image
    }
}

#[derive(Deserialize)]
struct RawDeploymentSpec {
    name: String,
    image: String,
}

impl TryFrom<RawDeploymentSpec> for DeploymentSpec {
    type Error = CloudError;

    fn try_from(raw: RawDeploymentSpec) -> Result<Self> {
        Self::new(raw.name, raw.image)
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CloudError::invalid_input("name", "must not be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(CloudError::invalid_input(
            "name",
            format!("'{}' is longer than {} characters", name, MAX_NAME_LEN),
        ));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
    {
        return Err(CloudError::invalid_input(
            "name",
            format!("'{}' contains invalid character '{}'", name, c),
        ));
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err(CloudError::invalid_input(
            "name",
            format!("'{}' must not start or end with '-'", name),
        ));
    }
    Ok(())
}

fn validate_image(image: &str) -> Result<()> {
    if image.is_empty() {
        return Err(CloudError::invalid_input("image", "must not be empty"));
    }
    if image.chars().any(char::is_whitespace) {
        return Err(CloudError::invalid_input(
            "image",
            format!("'{}' contains whitespace", image),
        ));
    }
    Ok(())
}

/// Handles published by a composed deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentHandle {
    /// Public address of the load balancer
    pub url: AttrRef,
}

/// A composed deployment, ready to hand to an engine
#[derive(Debug, Clone)]
pub struct Deployment {
    pub spec: DeploymentSpec,
    pub graph: ResourceGraph,
    pub handle: DeploymentHandle,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(err: CloudError) -> &'static str {
        match err {
            CloudError::InvalidInput { field, .. } => field,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_valid_spec() {
        let spec = DeploymentSpec::new("demo-01", "nginx:1.27").unwrap();
        assert_eq!(spec.name(), "demo-01");
        assert_eq!(spec.image(), "nginx:1.27");
    }

    #[test]
    fn test_invalid_names() {
        for name in ["", "Demo", "demo_app", "-demo", "demo-", "a-very-long-deployment-name"] {
            let err = DeploymentSpec::new(name, "nginx").unwrap_err();
            assert_eq!(field_of(err), "name", "{name:?} should be rejected");
        }
    }

    #[test]
    fn test_invalid_images() {
        for image in ["", "nginx latest", "\tnginx"] {
            let err = DeploymentSpec::new("demo", image).unwrap_err();
            assert_eq!(field_of(err), "image");
        }
    }

    #[test]
    fn test_deserialize_validates() {
        let spec: DeploymentSpec =
            serde_json::from_str(r#"{"name":"demo","image":"nginx"}"#).unwrap();
        assert_eq!(spec, DeploymentSpec::new("demo", "nginx").unwrap());

        let err = serde_json::from_str::<DeploymentSpec>(r#"{"name":"Bad_Name","image":"nginx"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("Invalid name"));
    }

    #[test]
    fn test_image_reference_is_not_resolved() {
        let spec = DeploymentSpec::new("demo", "registry.invalid/none:missing").unwrap();
        assert_eq!(spec.image(), "registry.invalid/none:missing");
    }
}
