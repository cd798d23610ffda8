//! webstack core
//!
//! - [`composer`] builds the resource graph of a load-balanced container
//!   service from a name and an image
//! - [`driver`] runs one apply or destroy of a named deployment against an
//!   orchestration engine

pub mod composer;
pub mod deployment;
pub mod driver;

// Re-exports
pub use composer::{compose, compose_graph, verify};
pub use deployment::{Deployment, DeploymentHandle, DeploymentSpec};
pub use driver::{Driver, DriverOptions, Intent, RunOutcome};
