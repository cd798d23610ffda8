//! Pulumi engine for webstack
//!
//! This crate implements the `Engine` trait by driving the pulumi CLI.
//! Deployment slots are pulumi stacks; the resource graph is rendered into a
//! Pulumi YAML program so no language runtime is needed.
//!
//! # Requirements
//!
//! - `pulumi` CLI must be installed and logged in to a backend
//! - AWS credentials are picked up by the aws plugin from the environment
//!
//! # Example
//!
//! ```ignore
//! use webstack_cloud::{Engine, SlotRef};
//! use webstack_pulumi::PulumiEngine;
//!
//! let engine = PulumiEngine::new(".webstack/program");
//! let slot = SlotRef::new("webapp", "demo");
//! if engine.slot_exists(&slot).await? {
//!     println!("{slot} is deployed");
//! }
//! ```

pub mod cli;
pub mod engine;
pub mod error;
pub mod program;

pub use cli::{PulumiCli, StackSummary};
pub use engine::PulumiEngine;
pub use error::{PulumiError, Result};
