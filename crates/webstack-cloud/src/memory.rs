//! In-process engine
//!
//! Keeps slots in memory and "applies" graphs by diffing them against the last
//! applied graph. Useful for dry runs and for exercising the driver without a
//! cloud account.

use crate::action::{ActionType, ApplyResult};
use crate::engine::{Engine, PluginSpec, Progress, ProgressEvent, SlotRef};
use crate::error::{CloudError, Result};
use crate::graph::{GraphBuilder, ResourceGraph};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

/// Engine operations, used to inject failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    SlotExists,
    SelectOrCreate,
    InstallPlugin,
    SetConfig,
    Refresh,
    Apply,
    Destroy,
    RemoveSlot,
}

#[derive(Debug, Default)]
struct SlotState {
    config: BTreeMap<String, String>,
    applied: Option<ResourceGraph>,
}

#[derive(Debug, Default)]
struct Inner {
    slots: HashMap<SlotRef, SlotState>,
    selected: Option<SlotRef>,
    plugins: Vec<PluginSpec>,
    calls: Vec<String>,
    failures: HashSet<Operation>,
}

/// In-memory [`Engine`] implementation
#[derive(Debug, Default)]
pub struct MemoryEngine {
    inner: Mutex<Inner>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call of `operation` fail with an engine error
    pub fn fail_on(self, operation: Operation) -> Self {
        self.lock().failures.insert(operation);
        self
    }

    /// Lifecycle calls received so far, e.g. "select webapp/demo"
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn has_slot(&self, slot: &SlotRef) -> bool {
        self.lock().slots.contains_key(slot)
    }

    pub fn config(&self, slot: &SlotRef, key: &str) -> Option<String> {
        self.lock()
            .slots
            .get(slot)
            .and_then(|s| s.config.get(key).cloned())
    }

    /// Graph recorded by the last successful apply
    pub fn applied_graph(&self, slot: &SlotRef) -> Option<ResourceGraph> {
        self.lock()
            .slots
            .get(slot)
            .and_then(|s| s.applied.clone())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn enter(&self, operation: Operation, call: String) -> Result<MutexGuard<'_, Inner>> {
        let mut inner = self.lock();
        tracing::debug!("memory engine: {}", call);
        inner.calls.push(call.clone());
        if inner.failures.contains(&operation) {
            return Err(CloudError::Engine(format!("injected failure: {}", call)));
        }
        Ok(inner)
    }
}

impl Inner {
    fn slot_mut(&mut self, slot: &SlotRef) -> Result<&mut SlotState> {
        self.slots
            .get_mut(slot)
            .ok_or_else(|| CloudError::SlotNotFound(slot.to_string()))
    }

    fn ensure_selected(&self, slot: &SlotRef) -> Result<()> {
        if self.selected.as_ref() != Some(slot) {
            return Err(CloudError::Engine(format!("slot {} is not selected", slot)));
        }
        Ok(())
    }
}

#[async_trait]
impl Engine for MemoryEngine {
    fn name(&self) -> &str {
        "memory"
    }

    async fn slot_exists(&self, slot: &SlotRef) -> Result<bool> {
        let inner = self.enter(Operation::SlotExists, format!("exists {}", slot))?;
        Ok(inner.slots.contains_key(slot))
    }

    async fn select_or_create_slot(&self, slot: &SlotRef) -> Result<()> {
        let mut inner = self.enter(Operation::SelectOrCreate, format!("select {}", slot))?;
        inner.slots.entry(slot.clone()).or_default();
        inner.selected = Some(slot.clone());
        Ok(())
    }

    async fn install_plugin(&self, slot: &SlotRef, plugin: &PluginSpec) -> Result<()> {
        let mut inner = self.enter(
            Operation::InstallPlugin,
            format!("plugin {} {}", plugin.name, plugin.version),
        )?;
        inner.slot_mut(slot)?;
        if !inner.plugins.contains(plugin) {
            inner.plugins.push(plugin.clone());
        }
        Ok(())
    }

    async fn set_config(&self, slot: &SlotRef, key: &str, value: &str) -> Result<()> {
        let mut inner = self.enter(Operation::SetConfig, format!("config {}={}", key, value))?;
        inner
            .slot_mut(slot)?
            .config
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn refresh(&self, slot: &SlotRef, progress: &dyn Progress) -> Result<()> {
        let mut inner = self.enter(Operation::Refresh, format!("refresh {}", slot))?;
        let state = inner.slot_mut(slot)?;
        let count = state.applied.as_ref().map_or(0, |g| g.len());
        progress.report(ProgressEvent::Output(format!(
            "refreshed {}: {} resources",
            slot, count
        )));
        Ok(())
    }

    async fn apply(
        &self,
        slot: &SlotRef,
        graph: &ResourceGraph,
        progress: &dyn Progress,
    ) -> Result<ApplyResult> {
        let start = std::time::Instant::now();
        let mut inner = self.enter(Operation::Apply, format!("apply {}", slot))?;
        inner.ensure_selected(slot)?;

        for resource in graph.resources() {
            let token = resource.kind.type_token();
            let installed = inner
                .plugins
                .iter()
                .any(|p| token.starts_with(&format!("{}:", p.name)));
            if !installed {
                return Err(CloudError::Engine(format!(
                    "no plugin installed for resource type {}",
                    token
                )));
            }
        }

        let state = inner.slot_mut(slot)?;
        let region = state.config.get("aws:region").cloned().ok_or_else(|| {
            CloudError::Engine("missing required configuration aws:region".to_string())
        })?;

        let previous = match &state.applied {
            Some(previous) => previous.clone(),
            None => GraphBuilder::new(graph.name(), graph.component_type()).build()?,
        };
        let plan = previous.diff(graph)?;
        tracing::info!("Plan for {}: {}", slot, plan.summary());

        let mut result = ApplyResult::new();
        for action in plan.actions.iter().filter(|a| a.action_type != ActionType::NoOp) {
            progress.report(ProgressEvent::Resource {
                action: action.action_type,
                resource_type: action.resource_type.clone(),
                resource_id: action.resource_id.clone(),
            });
            result.add_success(action.id.clone(), action.description.clone());
        }

        for (name, attr) in graph.outputs() {
            result.outputs.insert(
                name.clone(),
                serde_json::json!(format!(
                    "{}.{}.{}.memory",
                    attr.resource, attr.attribute, region
                )),
            );
        }

        state.applied = Some(graph.clone());
        result.duration_ms = start.elapsed().as_millis() as u64;
        Ok(result)
    }

    async fn destroy(&self, slot: &SlotRef, progress: &dyn Progress) -> Result<ApplyResult> {
        let start = std::time::Instant::now();
        let mut inner = self.enter(Operation::Destroy, format!("destroy {}", slot))?;
        inner.ensure_selected(slot)?;
        let state = inner.slot_mut(slot)?;

        let mut result = ApplyResult::new();
        if let Some(graph) = state.applied.take() {
            for resource in graph.destroy_order()? {
                progress.report(ProgressEvent::Resource {
                    action: ActionType::Delete,
                    resource_type: resource.kind.type_token().to_string(),
                    resource_id: resource.id.to_string(),
                });
                result.add_success(
                    format!("delete-{}", resource.id),
                    format!("deleted {}", resource.id),
                );
            }
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        Ok(result)
    }

    async fn remove_slot(&self, slot: &SlotRef) -> Result<()> {
        let mut inner = self.enter(Operation::RemoveSlot, format!("remove {}", slot))?;
        if inner.slot_mut(slot)?.applied.is_some() {
            return Err(CloudError::Engine(format!(
                "slot {} still has resources",
                slot
            )));
        }
        inner.slots.remove(slot);
        if inner.selected.as_ref() == Some(slot) {
            inner.selected = None;
        }
        Ok(())
    }
}
