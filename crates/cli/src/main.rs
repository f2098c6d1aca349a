//! `workflow-engine` CLI entry-point.
//!
//! Available sub-commands:
//! - `run`               — execute a workflow JSON file and print the result.
//! - `validate`           — check a workflow JSON file builds a valid DAG
//!   without executing it.
//! - `snapshot-roundtrip` — execute a workflow, snapshot it, reload the
//!   snapshot into a fresh engine, and execute again — a smoke test for the
//!   snapshot/restore path.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use engine::{Engine, ObserverManager, Payload, Snapshot};
use nodes::{Config, Registry};

#[derive(Parser)]
#[command(name = "workflow-engine", about = "Embeddable workflow execution engine", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum Profile {
    Default,
    Validation,
    Development,
}

impl Profile {
    fn resolve(self) -> Config {
        match self {
            Profile::Default => Config::default_profile(),
            Profile::Validation => Config::validation(),
            Profile::Development => Config::development(),
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Execute a workflow definition JSON file and print its result.
    Run {
        /// Path to the workflow JSON file.
        path: PathBuf,
        #[arg(long, value_enum, default_value = "default")]
        profile: Profile,
    },
    /// Validate a workflow definition JSON file without executing it.
    Validate {
        /// Path to the workflow JSON file.
        path: PathBuf,
        #[arg(long, value_enum, default_value = "default")]
        profile: Profile,
    },
    /// Execute a workflow, snapshot it, reload from the snapshot, and
    /// execute again — exercises the snapshot/restore path end-to-end.
    SnapshotRoundtrip {
        /// Path to the workflow JSON file.
        path: PathBuf,
        #[arg(long, value_enum, default_value = "default")]
        profile: Profile,
    },
}

fn registry() -> Result<Arc<Registry>> {
    let mut registry = Registry::new();
    nodes::register_builtins(&mut registry).context("registering built-in executors")?;
    Ok(Arc::new(registry))
}

fn load_payload(path: &PathBuf) -> Result<Payload> {
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {} as a workflow payload", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run { path, profile } => {
            let payload = load_payload(&path)?;
            let mut engine = Engine::new(payload, profile.resolve(), registry()?, ObserverManager::noop())?;
            info!(path = %path.display(), "executing workflow");
            let record = engine.execute().await;
            println!("{}", serde_json::to_string_pretty(&record)?);
            if !record.errors.is_empty() {
                std::process::exit(1);
            }
        }
        Command::Validate { path, profile } => {
            let payload = load_payload(&path)?;
            match Engine::new(payload, profile.resolve(), registry()?, ObserverManager::noop()) {
                Ok(_) => println!("workflow is valid"),
                Err(e) => {
                    eprintln!("validation failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        Command::SnapshotRoundtrip { path, profile } => {
            let payload = load_payload(&path)?;
            let config = profile.resolve();

            let mut engine = Engine::new(payload, config, registry()?, ObserverManager::noop())?;
            let first = engine.execute().await;
            info!(execution_id = %first.execution_id, "first execution finished");

            let snapshot_json = engine.snapshot().to_json()?;
            println!("snapshot:\n{}", serde_json::to_string_pretty(&snapshot_json)?);

            let snapshot = Snapshot::from_json(snapshot_json)?;
            let mut resumed = Engine::from_snapshot(snapshot, registry()?, ObserverManager::noop())?;
            let second = resumed.execute().await;
            info!(execution_id = %second.execution_id, "resumed execution finished");

            println!("resumed result:\n{}", serde_json::to_string_pretty(&second)?);
            if !first.errors.is_empty() || !second.errors.is_empty() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
