//! [`Engine`] implementation on top of the pulumi CLI

use crate::cli::PulumiCli;
use crate::error::Result;
use crate::program::{self, PROGRAM_FILE};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use webstack_cloud::{
    ApplyResult, Engine, PluginSpec, Progress, ProgressEvent, ResourceGraph, SlotRef,
};

/// Pulumi engine
///
/// Slots map to pulumi stacks. The resource graph is rendered as a Pulumi YAML
/// program inside `work_dir`, which is also where the CLI runs.
pub struct PulumiEngine {
    cli: PulumiCli,
}

impl PulumiEngine {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            cli: PulumiCli::new(work_dir),
        }
    }

    pub fn with_cli(cli: PulumiCli) -> Self {
        Self { cli }
    }

    pub fn work_dir(&self) -> &Path {
        self.cli.work_dir()
    }

    fn program_path(&self) -> PathBuf {
        self.work_dir().join(PROGRAM_FILE)
    }

    /// The CLI needs a project file before any stack command
    async fn ensure_project(&self, project: &str) -> Result<()> {
        tokio::fs::create_dir_all(self.work_dir()).await?;
        let path = self.program_path();
        if !tokio::fs::try_exists(&path).await? {
            tracing::debug!("Writing project stub {}", path.display());
            tokio::fs::write(&path, program::render_stub(project)?).await?;
        }
        Ok(())
    }

    async fn write_program(&self, project: &str, graph: &ResourceGraph) -> Result<()> {
        tokio::fs::create_dir_all(self.work_dir()).await?;
        let path = self.program_path();
        tracing::debug!("Writing program {}", path.display());
        tokio::fs::write(&path, program::render(project, graph)?).await?;
        Ok(())
    }
}

fn collect_result(events: Vec<ProgressEvent>, started: std::time::Instant) -> ApplyResult {
    let mut result = ApplyResult::new();
    for event in events {
        if let ProgressEvent::Resource {
            action,
            resource_id,
            ..
        } = event
        {
            result.add_success(
                format!("{}-{}", action, resource_id),
                format!("{} {}", action, resource_id),
            );
        }
    }
    result.duration_ms = started.elapsed().as_millis() as u64;
    result
}

#[async_trait]
impl Engine for PulumiEngine {
    fn name(&self) -> &str {
        "pulumi"
    }

    async fn slot_exists(&self, slot: &SlotRef) -> webstack_cloud::Result<bool> {
        self.ensure_project(&slot.project).await?;
        let stacks = self.cli.list_stacks().await?;
        Ok(stacks.iter().any(|s| s.is_named(&slot.name)))
    }

    async fn select_or_create_slot(&self, slot: &SlotRef) -> webstack_cloud::Result<()> {
        self.ensure_project(&slot.project).await?;
        self.cli.select_stack(&slot.name).await?;
        Ok(())
    }

    async fn install_plugin(
        &self,
        _slot: &SlotRef,
        plugin: &PluginSpec,
    ) -> webstack_cloud::Result<()> {
        self.cli
            .install_plugin("resource", &plugin.name, &plugin.version)
            .await?;
        Ok(())
    }

    async fn set_config(
        &self,
        slot: &SlotRef,
        key: &str,
        value: &str,
    ) -> webstack_cloud::Result<()> {
        self.cli.set_config(&slot.name, key, value).await?;
        Ok(())
    }

    async fn refresh(&self, slot: &SlotRef, progress: &dyn Progress) -> webstack_cloud::Result<()> {
        self.cli.refresh(&slot.name, progress).await?;
        Ok(())
    }

    async fn apply(
        &self,
        slot: &SlotRef,
        graph: &ResourceGraph,
        progress: &dyn Progress,
    ) -> webstack_cloud::Result<ApplyResult> {
        let started = std::time::Instant::now();
        self.write_program(&slot.project, graph).await?;

        let events = self.cli.up(&slot.name, progress).await?;
        let mut result = collect_result(events, started);
        result.outputs = self.cli.stack_outputs(&slot.name).await?;
        Ok(result)
    }

    async fn destroy(
        &self,
        slot: &SlotRef,
        progress: &dyn Progress,
    ) -> webstack_cloud::Result<ApplyResult> {
        let started = std::time::Instant::now();
        let events = self.cli.destroy(&slot.name, progress).await?;
        Ok(collect_result(events, started))
    }

    async fn remove_slot(&self, slot: &SlotRef) -> webstack_cloud::Result<()> {
        self.cli.remove_stack(&slot.name).await?;
        Ok(())
    }
}
