//! depwarden - self-healing dependency health
//!
//! Watches the container runtime's network path and a dependent service's
//! database configuration, and repairs both when they stay broken.
//!
//! # Usage
//!
//! ```bash
//! # Run both monitors until Ctrl+C
//! depwarden run
//!
//! # One-off checks, printed as JSON
//! depwarden check
//! depwarden validate
//!
//! # Pull an image with backoff and strategy rotation
//! depwarden pull postgres:16 --retries 5
//! ```
//!
//! # Environment Variables
//!
//! - `DEPWARDEN_CONFIG`: Path to the TOML config (default: ./depwarden.toml)
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use depwarden::background::MonitorHandle;
use depwarden::config::WardenConfig;
use depwarden::Warden;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "depwarden")]
#[command(about = "Self-healing health monitor for containerized dependencies")]
#[command(version)]
struct CliArgs {
    /// Config file (overrides $DEPWARDEN_CONFIG and ./depwarden.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: SubCommand,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Run the network monitor and the database validator until Ctrl+C
    Run,
    /// Run the network probe set once
    Check,
    /// Network status plus proxy, resolver and runtime diagnostics
    Status,
    /// Validate the database configuration once
    Validate,
    /// Run the network repair pipeline
    RepairNetwork,
    /// Run the database repair pipeline and re-validate
    RepairDb,
    /// Pull an image with retries
    Pull {
        image: String,

        /// Attempts before giving up (default: pull.max_retries)
        #[arg(long)]
        retries: Option<u32>,
    },
}

// ============================================================================
// Task Supervision
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum TaskName {
    NetworkMonitor,
    DatabaseValidator,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::NetworkMonitor => write!(f, "NetworkMonitor"),
            TaskName::DatabaseValidator => write!(f, "DatabaseValidator"),
        }
    }
}

/// Spawn a task that waits for a monitor loop to exit.
fn spawn_monitor(task_set: &mut JoinSet<Result<TaskName>>, name: TaskName, handle: MonitorHandle) {
    task_set.spawn(async move {
        handle
            .join()
            .await
            .with_context(|| format!("{name} loop panicked"))?;
        Ok(name)
    });
}

/// Run the supervisor loop: monitor tasks, cancel on failure.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    info!("Supervisor: all monitors spawned");

    loop {
        tokio::select! {
            () = cancel_token.cancelled() => {
                info!("Supervisor: shutdown signal received");
                break;
            }
            result = task_set.join_next() => {
                match result {
                    Some(Ok(Ok(task_name))) => {
                        info!("Supervisor: task {} completed", task_name);
                    }
                    Some(Ok(Err(e))) => {
                        error!("Supervisor: task failed: {:#}", e);
                        cancel_token.cancel();
                        return Err(e);
                    }
                    Some(Err(e)) => {
                        error!("Supervisor: task panicked: {}", e);
                        cancel_token.cancel();
                        return Err(anyhow::anyhow!("Task panicked: {}", e));
                    }
                    None => {
                        info!("Supervisor: all tasks completed");
                        break;
                    }
                }
            }
        }
    }

    // Let in-flight ticks finish.
    while let Some(result) = task_set.join_next().await {
        if let Ok(Ok(task_name)) = result {
            info!("Supervisor: task {} stopped", task_name);
        }
    }
    Ok(())
}

async fn run_monitors(warden: Warden) -> Result<()> {
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, stopping monitors");
        shutdown_token.cancel();
    });

    let running = warden.start(&cancel_token);
    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();
    spawn_monitor(&mut task_set, TaskName::NetworkMonitor, running.network);
    spawn_monitor(&mut task_set, TaskName::DatabaseValidator, running.database);

    run_supervisor(&mut task_set, cancel_token).await
}

// ============================================================================
// Helpers
// ============================================================================

fn load_config(path: Option<&PathBuf>) -> Result<WardenConfig> {
    match path {
        Some(path) => WardenConfig::load_from_file(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(WardenConfig::load()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("serializing output")?;
    println!("{text}");
    Ok(())
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.json_logs);

    let config = load_config(args.config.as_ref())?;
    info!(
        runtime = %config.runtime.binary,
        env_file = %config.database.env_file.display(),
        log_dir = %config.monitor.log_dir.display(),
        "depwarden configured"
    );
    let warden = Warden::new(config);

    match args.command {
        SubCommand::Run => run_monitors(warden).await?,
        SubCommand::Check => {
            let status = warden.network().check_network_health().await;
            print_json(&status)?;
        }
        SubCommand::Status => {
            let detailed = warden.network().detailed_network_status().await;
            print_json(&detailed)?;
        }
        SubCommand::Validate => {
            let result = warden.database().validate_database_configuration().await;
            print_json(&result)?;
        }
        SubCommand::RepairNetwork => {
            let outcome = warden.network().repair_network().await;
            print_json(&outcome)?;
            if !outcome.succeeded() {
                anyhow::bail!("network repair did not complete cleanly");
            }
        }
        SubCommand::RepairDb => {
            if !warden.database().repair_database_configuration().await {
                if let Some(result) = warden.database().last_validation_result().await {
                    print_json(&result)?;
                }
                anyhow::bail!("database configuration still invalid after repair");
            }
            info!("Database configuration repaired");
        }
        SubCommand::Pull { image, retries } => {
            let retries = retries.unwrap_or_else(|| warden.puller().default_retries());
            if !warden.puller().pull_image_with_retry(&image, retries).await {
                let reason = warden
                    .puller()
                    .last_error()
                    .await
                    .unwrap_or_else(|| "unknown error".to_string());
                warn!(%image, "Pull failed");
                anyhow::bail!("failed to pull {image} after {retries} attempts: {reason}");
            }
            println!("{image}");
        }
    }

    Ok(())
}
