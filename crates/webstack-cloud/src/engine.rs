//! Orchestration engine trait definition

use crate::action::{ActionType, ApplyResult};
use crate::error::Result;
use crate::graph::ResourceGraph;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// External orchestration engine abstraction
///
/// The engine owns state persistence, live diffing and execution. Callers only
/// bracket its lifecycle: pick a slot, prepare it, then apply or destroy.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Returns the engine name (e.g., "pulumi", "memory")
    fn name(&self) -> &str;

    /// Whether a slot with this name already exists
    async fn slot_exists(&self, slot: &SlotRef) -> Result<bool>;

    /// Select the slot, creating it when missing
    async fn select_or_create_slot(&self, slot: &SlotRef) -> Result<()>;

    /// Install a provider plugin at a pinned version
    async fn install_plugin(&self, slot: &SlotRef, plugin: &PluginSpec) -> Result<()>;

    /// Set a configuration key scoped to the slot
    async fn set_config(&self, slot: &SlotRef, key: &str, value: &str) -> Result<()>;

    /// Synchronize the slot's recorded state with live resources
    async fn refresh(&self, slot: &SlotRef, progress: &dyn Progress) -> Result<()>;

    /// Bring live resources in line with `graph`
    async fn apply(
        &self,
        slot: &SlotRef,
        graph: &ResourceGraph,
        progress: &dyn Progress,
    ) -> Result<ApplyResult>;

    /// Delete every resource recorded in the slot
    async fn destroy(&self, slot: &SlotRef, progress: &dyn Progress) -> Result<ApplyResult>;

    /// Remove the slot itself; it must be empty
    async fn remove_slot(&self, slot: &SlotRef) -> Result<()>;
}

/// Isolated, named deployment slot inside a project
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotRef {
    /// Logical program the slot belongs to
    pub project: String,

    /// Slot name (the deployment name)
    pub name: String,
}

impl SlotRef {
    pub fn new(project: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for SlotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.project, self.name)
    }
}

/// Provider plugin pinned to a version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginSpec {
    pub name: String,
    pub version: String,
}

impl PluginSpec {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl Default for PluginSpec {
    fn default() -> Self {
        Self::new("aws", "v4.0.0")
    }
}

/// Progress reported by an engine while it works
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Raw output line from the engine
    Output(String),

    /// A resource-level step
    Resource {
        action: ActionType,
        resource_type: String,
        resource_id: String,
    },
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressEvent::Output(line) => f.write_str(line),
            ProgressEvent::Resource {
                action,
                resource_type,
                resource_id,
            } => write!(f, "{} {} {}", action, resource_type, resource_id),
        }
    }
}

/// Receiver of engine progress
pub trait Progress: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

impl<F> Progress for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn report(&self, event: ProgressEvent) {
        self(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_closure_progress() {
        let seen = Mutex::new(Vec::new());
        let progress = |event: ProgressEvent| seen.lock().unwrap().push(event.to_string());

        progress.report(ProgressEvent::Output("refreshing".to_string()));
        progress.report(ProgressEvent::Resource {
            action: ActionType::Create,
            resource_type: "aws:ecs:Cluster".to_string(),
            resource_id: "demo-cluster".to_string(),
        });

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["refreshing", "create aws:ecs:Cluster demo-cluster"]
        );
    }

    #[test]
    fn test_slot_display() {
        assert_eq!(SlotRef::new("webapp", "demo").to_string(), "webapp/demo");
        assert_eq!(PluginSpec::default(), PluginSpec::new("aws", "v4.0.0"));
    }
}
