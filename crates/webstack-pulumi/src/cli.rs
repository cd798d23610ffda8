//! pulumi CLI wrapper
//!
//! Every command runs non-interactively against a single program directory.
//! Long-running commands (`refresh`, `up`, `destroy`) stream their output
//! line by line to a [`Progress`] sink.

use crate::error::{PulumiError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use webstack_cloud::{ActionType, Progress, ProgressEvent};

/// pulumi CLI wrapper
pub struct PulumiCli {
    binary: String,
    work_dir: PathBuf,
}

impl PulumiCli {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: "pulumi".to_string(),
            work_dir: work_dir.into(),
        }
    }

    /// Use another executable than `pulumi` from `PATH`
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--cwd").arg(&self.work_dir);
        cmd.arg("--non-interactive");
        cmd.args(args);

        tracing::debug!(
            "Running: {} --cwd {} {}",
            self.binary,
            self.work_dir.display(),
            args.join(" ")
        );
        cmd
    }

    /// Run a pulumi command and return stdout
    async fn run_command(&self, args: &[&str]) -> Result<String> {
        capture(self.command(args)).await
    }

    /// Run a pulumi command, forwarding its output to `progress`
    async fn stream_command(
        &self,
        args: &[&str],
        progress: &dyn Progress,
    ) -> Result<Vec<ProgressEvent>> {
        stream(self.command(args), progress).await
    }

    /// Stacks of the project in the work dir
    pub async fn list_stacks(&self) -> Result<Vec<StackSummary>> {
        let output = self.run_command(&["stack", "ls", "--json"]).await?;

        if output.trim().is_empty() || output.trim() == "[]" {
            return Ok(Vec::new());
        }

        let stacks: Vec<StackSummary> = serde_json::from_str(&output)?;
        Ok(stacks)
    }

    /// Select a stack, creating it when missing
    pub async fn select_stack(&self, stack: &str) -> Result<()> {
        self.run_command(&["stack", "select", stack, "--create"])
            .await?;
        Ok(())
    }

    pub async fn install_plugin(&self, kind: &str, name: &str, version: &str) -> Result<()> {
        self.run_command(&["plugin", "install", kind, name, version])
            .await?;
        Ok(())
    }

    pub async fn set_config(&self, stack: &str, key: &str, value: &str) -> Result<()> {
        self.run_command(&["config", "set", key, value, "--stack", stack])
            .await?;
        Ok(())
    }

    pub async fn refresh(
        &self,
        stack: &str,
        progress: &dyn Progress,
    ) -> Result<Vec<ProgressEvent>> {
        self.stream_command(&["refresh", "--yes", "--stack", stack], progress)
            .await
    }

    pub async fn up(&self, stack: &str, progress: &dyn Progress) -> Result<Vec<ProgressEvent>> {
        self.stream_command(&["up", "--yes", "--skip-preview", "--stack", stack], progress)
            .await
    }

    pub async fn destroy(
        &self,
        stack: &str,
        progress: &dyn Progress,
    ) -> Result<Vec<ProgressEvent>> {
        self.stream_command(&["destroy", "--yes", "--stack", stack], progress)
            .await
    }

    /// Stack outputs as JSON values
    pub async fn stack_outputs(&self, stack: &str) -> Result<BTreeMap<String, serde_json::Value>> {
        let output = self
            .run_command(&["stack", "output", "--json", "--stack", stack])
            .await?;

        if output.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        let outputs = serde_json::from_str(&output)?;
        Ok(outputs)
    }

    pub async fn remove_stack(&self, stack: &str) -> Result<()> {
        self.run_command(&["stack", "rm", stack, "--yes"]).await?;
        Ok(())
    }
}

/// Entry of `pulumi stack ls --json`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackSummary {
    pub name: String,
    #[serde(default)]
    pub current: bool,
    #[serde(default)]
    pub update_in_progress: bool,
    #[serde(default)]
    pub resource_count: Option<u32>,
}

impl StackSummary {
    /// Stack names may be qualified as `org/project/stack`
    pub fn is_named(&self, stack: &str) -> bool {
        self.name == stack || self.name.rsplit('/').next() == Some(stack)
    }
}

async fn capture(mut cmd: Command) -> Result<String> {
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let output = cmd.output().await.map_err(spawn_error)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PulumiError::CommandFailed(stderr.trim().to_string()));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

async fn stream(mut cmd: Command, progress: &dyn Progress) -> Result<Vec<ProgressEvent>> {
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);

    let mut child = cmd.spawn().map_err(spawn_error)?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| PulumiError::CommandFailed("stdout not captured".to_string()))?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| PulumiError::CommandFailed("stderr not captured".to_string()))?;

    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr.read_to_end(&mut buf).await.map(|_| buf)
    });

    let mut resource_events = Vec::new();
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']);

        if let Some(event) = parse_resource_line(line) {
            progress.report(event.clone());
            resource_events.push(event);
        } else if !line.trim().is_empty() {
            progress.report(ProgressEvent::Output(line.to_string()));
        }
    }

    let status = child.wait().await?;
    let stderr = stderr_task
        .await
        .map_err(|e| PulumiError::CommandFailed(e.to_string()))??;

    if !status.success() {
        let stderr = String::from_utf8_lossy(&stderr);
        return Err(PulumiError::CommandFailed(stderr.trim().to_string()));
    }

    Ok(resource_events)
}

fn spawn_error(err: std::io::Error) -> PulumiError {
    if err.kind() == std::io::ErrorKind::NotFound {
        PulumiError::PulumiNotFound
    } else {
        PulumiError::IoError(err)
    }
}

/// Recognize a finished resource step such as
/// ` +  aws:ecs:Cluster demo-cluster created (2s)`
fn parse_resource_line(line: &str) -> Option<ProgressEvent> {
    let mut words = line.split_whitespace();
    let op = words.next()?;
    if !matches!(op, "+" | "~" | "-" | "+-") {
        return None;
    }
    let resource_type = words.next()?;
    let resource_id = words.next()?;
    let action = match words.next()? {
        "created" => ActionType::Create,
        "updated" | "replaced" => ActionType::Update,
        "deleted" => ActionType::Delete,
        _ => return None,
    };
    if !resource_type.contains(':') {
        return None;
    }

    Some(ProgressEvent::Resource {
        action,
        resource_type: resource_type.to_string(),
        resource_id: resource_id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn shell(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn test_parse_resource_line() {
        let event = parse_resource_line(" +  aws:ecs:Cluster demo-cluster created (2s)").unwrap();
        assert_eq!(
            event,
            ProgressEvent::Resource {
                action: ActionType::Create,
                resource_type: "aws:ecs:Cluster".to_string(),
                resource_id: "demo-cluster".to_string(),
            }
        );

        let event = parse_resource_line(" -  aws:ecs:Service demo-svc deleted (40s)").unwrap();
        assert!(matches!(event, ProgressEvent::Resource { action: ActionType::Delete, .. }));

        assert!(parse_resource_line(" +  aws:ecs:Cluster demo-cluster creating (0s)").is_none());
        assert!(parse_resource_line("Resources:").is_none());
        assert!(parse_resource_line("    + 9 created").is_none());
    }

    #[test]
    fn test_stack_summary() {
        let stacks: Vec<StackSummary> = serde_json::from_str(
            r#"[{"name":"demo","current":true,"updateInProgress":false,"resourceCount":11},
                {"name":"acme/webapp/other"}]"#,
        )
        .unwrap();

        assert!(stacks[0].is_named("demo"));
        assert_eq!(stacks[0].resource_count, Some(11));
        assert!(stacks[1].is_named("other"));
        assert!(!stacks[1].is_named("demo"));
    }

    #[tokio::test]
    async fn test_capture_failure_carries_stderr() {
        let err = capture(shell("echo boom >&2; exit 3")).await.unwrap_err();
        match err {
            PulumiError::CommandFailed(stderr) => assert_eq!(stderr, "boom"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_stream_forwards_lines() {
        let seen = Mutex::new(Vec::new());
        let progress = |event: ProgressEvent| seen.lock().unwrap().push(event.to_string());

        let events = stream(
            shell("echo Updating; echo ' +  aws:ecs:Cluster demo-cluster created (1s)'"),
            &progress,
        )
        .await
        .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(seen.lock().unwrap().len(), 2);
        assert_eq!(seen.lock().unwrap()[0], "Updating");
    }

    #[tokio::test]
    async fn test_stream_tolerates_invalid_utf8() {
        let seen = Mutex::new(Vec::new());
        let progress = |event: ProgressEvent| seen.lock().unwrap().push(event.to_string());

        let events = stream(shell("printf '\\377abc\\n'; echo done"), &progress)
            .await
            .unwrap();

        assert!(events.is_empty());
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].ends_with("abc"));
        assert_eq!(seen[1], "done");
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let cli = PulumiCli::new(std::env::temp_dir()).with_binary("webstack-no-such-pulumi");
        let err = cli.list_stacks().await.unwrap_err();
        assert!(matches!(err, PulumiError::PulumiNotFound));
    }
}
