use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use loom_agents::builtin_registry;
use loom_config::{FailurePolicy, Mapping, RunConfig, WorkflowDef};
use loom_orchestrator::{Orchestrator, RunOutcome};
use loom_store::RunStatus;
use loom_workflow::Workflow;

mod logging;

use logging::LogLevel;

/// Loom - run workflows of async agents as a dependency graph
#[derive(Parser)]
#[command(name = "loom")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Log level (overrides the LOOM_LOG environment variable)
  #[arg(long, global = true, value_enum)]
  log_level: Option<LogLevel>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a workflow to completion and print the outcome as JSON
  Run {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,

    #[command(flatten)]
    overrides: ConfigOverrides,

    /// Write artifacts produced by agents into this directory
    #[arg(long)]
    artifact_dir: Option<PathBuf>,
  },

  /// Validate a workflow and print its dependency plan
  Plan {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,
  },

  /// List the registered agent types
  Agents,
}

/// Run configuration flags. Each one overrides the workflow file's `config`.
#[derive(Args, Debug, Default, Clone)]
struct ConfigOverrides {
  #[arg(long)]
  max_retries: Option<u32>,

  #[arg(long)]
  timeout_ms: Option<u64>,

  #[arg(long)]
  backoff_ms: Option<u64>,

  #[arg(long)]
  max_concurrency: Option<usize>,

  /// contain | cascade
  #[arg(long)]
  failure_policy: Option<FailurePolicy>,
}

impl ConfigOverrides {
  fn apply(&self, mut config: RunConfig) -> RunConfig {
    if let Some(v) = self.max_retries {
      config.max_retries = v;
    }
    if let Some(v) = self.timeout_ms {
      config.timeout_ms = v;
    }
    if let Some(v) = self.backoff_ms {
      config.backoff_ms = v;
    }
    if let Some(v) = self.max_concurrency {
      config.max_concurrency = v;
    }
    if let Some(v) = self.failure_policy {
      config.failure_policy = v;
    }
    config
  }
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  logging::init_logging(cli.log_level)?;

  match cli.command {
    Some(Commands::Run {
      workflow_file,
      overrides,
      artifact_dir,
    }) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(run_workflow(workflow_file, overrides, artifact_dir))?;
    }
    Some(Commands::Plan { workflow_file }) => {
      plan_workflow(&workflow_file)?;
    }
    Some(Commands::Agents) => {
      let registry = builtin_registry().context("failed to register built-in agents")?;
      for name in registry.names() {
        println!("{}", name);
      }
    }
    None => {
      println!("loom - use --help to see available commands");
    }
  }

  Ok(())
}

async fn run_workflow(
  workflow_file: PathBuf,
  overrides: ConfigOverrides,
  artifact_dir: Option<PathBuf>,
) -> Result<()> {
  let mut def = load_workflow(&workflow_file)?;
  info!(
    workflow = def.name.as_deref().unwrap_or(""),
    nodes = def.nodes.len(),
    "loaded workflow"
  );

  let payload = read_payload_from_stdin()?;
  def.initial_inputs = merge_inputs(def.initial_inputs, payload);
  def.config = Some(overrides.apply(def.config.take().unwrap_or_default()));

  let registry = builtin_registry().context("failed to register built-in agents")?;
  let orchestrator = Orchestrator::in_memory(registry);

  let cancel = CancellationToken::new();
  let interrupt = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      warn!("interrupted, cancelling run");
      interrupt.cancel();
    }
  });

  let result = orchestrator.execute_with_cancel(def, cancel).await;

  let outcome = match result {
    Ok(outcome) => outcome,
    Err(e) => {
      // Print whatever the run got to before it aborted.
      if let Some(summary) = orchestrator.list_runs().await?.pop() {
        let run = orchestrator.get_run(&summary.run_id).await?;
        println!("{}", serde_json::to_string_pretty(&run)?);
      }
      return Err(e).context("workflow execution failed");
    }
  };

  if let Some(dir) = artifact_dir {
    write_artifacts(&orchestrator, &outcome, &dir).await?;
  }

  println!("{}", serde_json::to_string_pretty(&outcome)?);

  if outcome.status != RunStatus::Completed {
    bail!("run {} finished with status {}", outcome.run_id, outcome.status);
  }
  Ok(())
}

async fn write_artifacts(
  orchestrator: &Orchestrator,
  outcome: &RunOutcome,
  dir: &Path,
) -> Result<()> {
  let run = orchestrator.get_run(&outcome.run_id).await?;
  if run.artifacts.is_empty() {
    return Ok(());
  }

  tokio::fs::create_dir_all(dir)
    .await
    .with_context(|| format!("failed to create artifact directory: {}", dir.display()))?;
  for (name, data) in &run.artifacts {
    let path = dir.join(name);
    tokio::fs::write(&path, data)
      .await
      .with_context(|| format!("failed to write artifact: {}", path.display()))?;
    info!(artifact = %path.display(), bytes = data.len(), "wrote artifact");
  }
  Ok(())
}

fn plan_workflow(workflow_file: &Path) -> Result<()> {
  let def = load_workflow(workflow_file)?;
  let workflow = Workflow::new(def)
    .with_context(|| format!("invalid workflow: {}", workflow_file.display()))?;

  let graph = workflow.graph();
  let plan = serde_json::json!({
    "name": workflow.name,
    "predecessors": graph.predecessor_map(),
    "layering": graph.layering(),
  });
  println!("{}", serde_json::to_string_pretty(&plan)?);
  Ok(())
}

fn load_workflow(workflow_file: &Path) -> Result<WorkflowDef> {
  let content = std::fs::read_to_string(workflow_file)
    .with_context(|| format!("failed to read workflow file: {}", workflow_file.display()))?;

  serde_json::from_str(&content)
    .with_context(|| format!("failed to parse workflow file: {}", workflow_file.display()))
}

/// Stdin keys win over the file's initial inputs.
fn merge_inputs(mut initial: Mapping, payload: Mapping) -> Mapping {
  initial.extend(payload);
  initial
}

fn read_payload_from_stdin() -> Result<Mapping> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    // No stdin pipe, nothing to merge
    return Ok(Mapping::new());
  }

  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read payload from stdin")?;
  parse_payload(&input)
}

fn parse_payload(input: &str) -> Result<Mapping> {
  if input.trim().is_empty() {
    return Ok(Mapping::new());
  }
  let payload: serde_json::Value =
    serde_json::from_str(input).context("failed to parse payload JSON from stdin")?;
  match payload {
    serde_json::Value::Object(map) => Ok(map),
    other => bail!("stdin payload must be a JSON object, got: {}", other),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use std::io::Write;

  fn write_workflow(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
  }

  #[test]
  fn test_load_workflow_accepts_aliases() {
    let file = write_workflow(
      r#"{
        "name": "demo",
        "nodes": [
          {"id": "A", "agent": "add", "params": {"values": [2, 8]}},
          {"id": "B", "agentType": "multiply", "params": {"values": ["A", 3]}}
        ],
        "edges": [{"from_": "A", "to": "B"}],
        "initialInputs": {"seed": 1},
        "config": {"max_retries": 0}
      }"#,
    );

    let def = load_workflow(file.path()).unwrap();
    assert_eq!(def.name.as_deref(), Some("demo"));
    assert_eq!(def.nodes[1].agent_type.as_deref(), Some("multiply"));
    assert_eq!(def.edges[0].from, "A");
    assert_eq!(def.initial_inputs["seed"], json!(1));
    let config = def.config.unwrap();
    assert_eq!(config.max_retries, 0);
    assert_eq!(config.max_concurrency, 3);
  }

  #[test]
  fn test_load_workflow_reports_bad_files() {
    let missing = load_workflow(Path::new("/nonexistent/workflow.json")).unwrap_err();
    assert!(missing.to_string().contains("failed to read workflow file"));

    let file = write_workflow("{not json");
    let invalid = load_workflow(file.path()).unwrap_err();
    assert!(invalid.to_string().contains("failed to parse workflow file"));
  }

  #[test]
  fn test_overrides_layer_over_file_config() {
    let file_config = RunConfig {
      max_retries: 5,
      backoff_ms: 10,
      ..RunConfig::default()
    };
    let overrides = ConfigOverrides {
      max_retries: Some(1),
      failure_policy: Some(FailurePolicy::Contain),
      ..ConfigOverrides::default()
    };

    let config = overrides.apply(file_config);
    assert_eq!(config.max_retries, 1);
    assert_eq!(config.backoff_ms, 10);
    assert_eq!(config.failure_policy, FailurePolicy::Contain);
    assert_eq!(config.timeout_ms, 30_000);
  }

  #[test]
  fn test_stdin_payload_wins() {
    let initial = parse_payload(r#"{"a": 1, "b": 2}"#).unwrap();
    let payload = parse_payload(r#"{"b": 3}"#).unwrap();

    let merged = merge_inputs(initial, payload);
    assert_eq!(serde_json::Value::Object(merged), json!({"a": 1, "b": 3}));
  }

  #[test]
  fn test_payload_must_be_object() {
    assert!(parse_payload("").unwrap().is_empty());
    assert!(parse_payload("[1, 2]").is_err());
  }

  #[test]
  fn test_cli_parses_run_flags() {
    let cli = Cli::try_parse_from([
      "loom",
      "--log-level",
      "debug",
      "run",
      "wf.json",
      "--max-concurrency",
      "4",
      "--failure-policy",
      "contain",
    ])
    .unwrap();

    assert_eq!(cli.log_level, Some(LogLevel::Debug));
    match cli.command {
      Some(Commands::Run { overrides, .. }) => {
        assert_eq!(overrides.max_concurrency, Some(4));
        assert_eq!(overrides.failure_policy, Some(FailurePolicy::Contain));
      }
      _ => panic!("expected run command"),
    }
  }
}
