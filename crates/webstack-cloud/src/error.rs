//! Error types shared by the graph, engines and resolvers

use thiserror::Error;

/// Errors raised while composing, validating or deploying a resource graph
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Network resolution failed: {0}")]
    NetworkResolution(String),

    #[error("Invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("Duplicate resource: {0}")]
    DuplicateResource(String),

    #[error("Unknown resource referenced: {0}")]
    UnknownResource(String),

    #[error("Resource {id} does not carry the deployment prefix '{prefix}-'")]
    MissingPrefix { id: String, prefix: String },

    #[error("Circular dependency detected between: {}", .0.join(", "))]
    CyclicDependency(Vec<String>),

    #[error("Deployment slot not found: {0}")]
    SlotNotFound(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    pub fn invalid_input(field: &'static str, reason: impl Into<String>) -> Self {
        CloudError::InvalidInput {
            field,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
