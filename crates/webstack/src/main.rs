mod progress;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use progress::SpinnerProgress;
use tracing_subscriber::EnvFilter;
use webstack_cloud::{
    Engine, MemoryEngine, NetworkContext, NetworkResolver, PluginSpec, StaticNetwork,
};
use webstack_cloud_aws::Ec2NetworkResolver;
use webstack_config::{EngineKind, Settings};
use webstack_core::{Driver, DriverOptions, Intent, RunOutcome};
use webstack_pulumi::PulumiEngine;

#[derive(Parser)]
#[command(name = "webstack", version)]
#[command(about = "Deploy a load-balanced container service to AWS", long_about = None)]
struct Cli {
    /// Deployment name (lowercase letters, digits and '-')
    name: String,

    /// Tear the deployment down instead of applying it
    #[arg(long)]
    destroy: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    if let Err(err) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = webstack_config::load().context("failed to load settings")?;
    let intent = Intent::from_destroy_flag(cli.destroy);

    let (engine, network): (Box<dyn Engine>, Box<dyn NetworkResolver>) = match settings.engine {
        EngineKind::Pulumi => (
            Box::new(PulumiEngine::new(&settings.work_dir)),
            Box::new(Ec2NetworkResolver::from_env(settings.region.as_str()).await),
        ),
        EngineKind::Memory => (
            Box::new(MemoryEngine::new()),
            Box::new(StaticNetwork::new(local_network()?)),
        ),
    };
    tracing::debug!("Using engine {}", engine.name());

    let verb = match intent {
        Intent::Apply => "Deploying",
        Intent::Destroy => "Destroying",
    };
    let progress = SpinnerProgress::new(&format!("{} {}...", verb, cli.name));
    let driver = Driver::new(
        engine.as_ref(),
        network.as_ref(),
        &progress,
        driver_options(&settings),
    );

    let outcome = driver.run(&cli.name, intent).await;
    progress.finish();

    match outcome? {
        RunOutcome::Applied { url, result } => {
            eprintln!(
                "{} {} deployed ({} changes, {}ms)",
                "✓".green(),
                cli.name.cyan(),
                result.succeeded.len(),
                result.duration_ms
            );
            match url {
                Some(url) => println!("{}", url),
                None => eprintln!("{} engine reported no url output", "!".yellow()),
            }
        }
        RunOutcome::Destroyed { result } => {
            eprintln!(
                "{} {} destroyed ({} resources removed)",
                "✓".green(),
                cli.name.cyan(),
                result.succeeded.len()
            );
        }
        RunOutcome::NothingToDestroy => {
            eprintln!(
                "{} {} does not exist, nothing to destroy",
                "✓".green(),
                cli.name.cyan()
            );
        }
    }

    Ok(())
}

fn driver_options(settings: &Settings) -> DriverOptions {
    DriverOptions {
        project: settings.project.clone(),
        region: settings.region.clone(),
        image: settings.image.clone(),
        plugin: PluginSpec::new(settings.plugin.name.as_str(), settings.plugin.version.as_str()),
        state_dir: settings.state_dir.clone(),
    }
}

/// Placeholder network for the in-process engine
fn local_network() -> anyhow::Result<NetworkContext> {
    Ok(NetworkContext::new(
        "vpc-local",
        vec!["subnet-local-a".to_string(), "subnet-local-b".to_string()],
    )?)
}
