//! Stack driver
//!
//! Brackets a single apply or destroy of one deployment slot. The driver never
//! retries: every engine or resolver failure is returned as-is.

use crate::composer::{self, URL_OUTPUT};
use crate::deployment::DeploymentSpec;
use std::path::PathBuf;
use webstack_cloud::{
    ApplyResult, Engine, LockManager, NetworkResolver, PluginSpec, Progress, Result, SlotRef,
};

/// Fixed settings of a driver run
#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// Logical program every slot belongs to
    pub project: String,

    /// Region the provider is pinned to
    pub region: String,

    /// Image deployed on apply
    pub image: String,

    /// Provider plugin to ensure before applying
    pub plugin: PluginSpec,

    /// Directory holding per-deployment locks
    pub state_dir: PathBuf,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            project: "webapp".to_string(),
            region: "us-west-2".to_string(),
            image: "nginx".to_string(),
            plugin: PluginSpec::default(),
            state_dir: PathBuf::from(".webstack"),
        }
    }
}

/// What a run should do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Apply,
    Destroy,
}

impl Intent {
    pub fn from_destroy_flag(destroy: bool) -> Self {
        if destroy { Intent::Destroy } else { Intent::Apply }
    }
}

/// How a successful run ended
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Applied {
        /// Public load-balancer address, when the engine reported it
        url: Option<String>,
        result: ApplyResult,
    },
    Destroyed {
        result: ApplyResult,
    },
    /// Destroy was requested for a slot that does not exist
    NothingToDestroy,
}

pub struct Driver<'a> {
    engine: &'a dyn Engine,
    network: &'a dyn NetworkResolver,
    progress: &'a dyn Progress,
    options: DriverOptions,
}

impl<'a> Driver<'a> {
    pub fn new(
        engine: &'a dyn Engine,
        network: &'a dyn NetworkResolver,
        progress: &'a dyn Progress,
        options: DriverOptions,
    ) -> Self {
        Self {
            engine,
            network,
            progress,
            options,
        }
    }

    pub fn options(&self) -> &DriverOptions {
        &self.options
    }

    /// Apply or destroy the deployment `name`
    ///
    /// Input is validated and the deployment lock is taken before the engine
    /// is contacted.
    pub async fn run(&self, name: &str, intent: Intent) -> Result<RunOutcome> {
        let spec = DeploymentSpec::new(name, self.options.image.as_str())?;
        let slot = SlotRef::new(self.options.project.as_str(), spec.name());

        let lock = LockManager::new(&self.options.state_dir)
            .acquire(spec.name())
            .await?;

        let outcome = match intent {
            Intent::Apply => self.apply(&spec, &slot).await,
            Intent::Destroy => self.destroy(&slot).await,
        };

        let released = lock.release().await;
        let outcome = outcome?;
        released?;
        Ok(outcome)
    }

    async fn apply(&self, spec: &DeploymentSpec, slot: &SlotRef) -> Result<RunOutcome> {
        tracing::info!("Preparing slot {} with engine {}", slot, self.engine.name());
        self.engine.select_or_create_slot(slot).await?;

        tracing::info!(
            "Ensuring plugin {} {}",
            self.options.plugin.name,
            self.options.plugin.version
        );
        self.engine
            .install_plugin(slot, &self.options.plugin)
            .await?;

        let region_key = format!("{}:region", self.options.plugin.name);
        self.engine
            .set_config(slot, &region_key, &self.options.region)
            .await?;

        tracing::info!("Refreshing {}", slot);
        self.engine.refresh(slot, self.progress).await?;

        let deployment = composer::compose(spec, self.network).await?;
        tracing::info!(
            "Applying {} resources to {}",
            deployment.graph.len(),
            slot
        );
        let result = self
            .engine
            .apply(slot, &deployment.graph, self.progress)
            .await?;

        let url = result.output_str(URL_OUTPUT).map(str::to_string);
        Ok(RunOutcome::Applied { url, result })
    }

    async fn destroy(&self, slot: &SlotRef) -> Result<RunOutcome> {
        if !self.engine.slot_exists(slot).await? {
            tracing::info!("Slot {} does not exist, nothing to destroy", slot);
            return Ok(RunOutcome::NothingToDestroy);
        }

        self.engine.select_or_create_slot(slot).await?;

        tracing::info!("Refreshing {}", slot);
        self.engine.refresh(slot, self.progress).await?;

        tracing::info!("Destroying {}", slot);
        let result = self.engine.destroy(slot, self.progress).await?;

        self.engine.remove_slot(slot).await?;
        tracing::info!("Removed slot {}", slot);

        Ok(RunOutcome::Destroyed { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_from_flag() {
        assert_eq!(Intent::from_destroy_flag(true), Intent::Destroy);
        assert_eq!(Intent::from_destroy_flag(false), Intent::Apply);
    }

    #[test]
    fn test_default_options() {
        let options = DriverOptions::default();
        assert_eq!(options.project, "webapp");
        assert_eq!(options.region, "us-west-2");
        assert_eq!(options.plugin, PluginSpec::new("aws", "v4.0.0"));
    }
}
