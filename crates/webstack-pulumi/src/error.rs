//! Pulumi engine error types

use thiserror::Error;
use webstack_cloud::CloudError;

#[derive(Error, Debug)]
pub enum PulumiError {
    #[error("pulumi not found. Please install: https://www.pulumi.com/docs/install/")]
    PulumiNotFound,

    #[error("pulumi command failed: {0}")]
    CommandFailed(String),

    #[error("Cannot render program: {0}")]
    Render(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Cloud error: {0}")]
    CloudError(#[from] CloudError),
}

impl From<PulumiError> for CloudError {
    fn from(err: PulumiError) -> Self {
        match err {
            PulumiError::CommandFailed(stderr) => CloudError::CommandFailed(stderr),
            PulumiError::CloudError(inner) => inner,
            other => CloudError::Engine(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, PulumiError>;
