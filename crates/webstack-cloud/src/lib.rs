//! webstack cloud layer
//!
//! This crate holds everything that sits between a deployment description and
//! the external orchestration engine:
//!
//! - the declarative [`ResourceGraph`] with typed edges and an ownership map
//! - the [`Engine`] trait the driver talks to, plus an in-memory implementation
//! - the [`NetworkResolver`] trait for ambient network lookups
//! - per-deployment lease locks
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  webstack CLI                    │
//! │              (webstack <name> [--destroy])        │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               webstack-core                      │
//! │      composer (graph)   │   driver (lifecycle)   │
//! └───────┬─────────────────┬───────────────────────┘
//!         │                 │
//! ┌───────▼───────┐ ┌───────▼───────┐
//! │ NetworkResolver│ │    Engine     │
//! │  (aws-sdk-ec2) │ │ (pulumi CLI)  │
//! └───────────────┘ └───────────────┘
//! ```

pub mod action;
pub mod engine;
pub mod error;
pub mod graph;
pub mod lock;
pub mod memory;
pub mod network;

// Re-exports
pub use action::{Action, ActionResult, ActionType, ApplyResult, Plan, PlanSummary};
pub use engine::{Engine, PluginSpec, Progress, ProgressEvent, SlotRef};
pub use error::{CloudError, Result};
pub use graph::{
    AttrRef, Edge, EdgeKind, GraphBuilder, Owner, Resource, ResourceGraph, ResourceId,
    ResourceKind, Value,
};
pub use lock::{LockManager, SlotLock};
pub use memory::{MemoryEngine, Operation};
pub use network::{NetworkContext, NetworkResolver, StaticNetwork};
