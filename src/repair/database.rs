//! Database-dependency repair steps.
//!
//! Order matters: the config file is fixed before anything is started, the
//! database is started before the application, and the application must be
//! up before its management commands can run inside it.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{backup_file, RepairError, RepairStep};
use crate::background::Sleeper;
use crate::config::DatabaseConfig;
use crate::process::{run_checked, run_first_success, CommandCatalog, Operation, ProcessRunner};
use crate::validator::{ConnectionUrl, DependencyConfig, EnvFileError};

// ============================================================================
// Config File
// ============================================================================

/// Restore a well-formed connection string and drop deny-listed plugins.
pub struct ConfigFileRepair {
    config: DatabaseConfig,
}

impl ConfigFileRepair {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl RepairStep for ConfigFileRepair {
    fn name(&self) -> &'static str {
        "config-file"
    }

    async fn run(&self) -> Result<String, RepairError> {
        let path = &self.config.env_file;
        let mut env = match DependencyConfig::load(path) {
            Ok(env) => env,
            Err(EnvFileError::Missing(_)) => DependencyConfig::default(),
            Err(e) => return Err(e.into()),
        };

        let mut changes: Vec<String> = Vec::new();
        let key = self.config.connection_key.as_str();
        match env.get(key).map(ConnectionUrl::parse) {
            Some(Ok(_)) => {}
            Some(Err(_)) => {
                env.set(key, self.config.default_connection_url.clone());
                changes.push(format!("replaced malformed {key}"));
            }
            None => {
                env.set(key, self.config.default_connection_url.clone());
                changes.push(format!("added {key}"));
            }
        }

        let plugins = env.list(&self.config.plugin_key);
        let (denied, kept): (Vec<String>, Vec<String>) = plugins
            .into_iter()
            .partition(|p| self.config.plugin_denylist.iter().any(|d| d == p));
        if !denied.is_empty() {
            env.set_list(&self.config.plugin_key, &kept);
            changes.push(format!("removed plugins {}", denied.join(", ")));
        }

        if !env.duplicates().is_empty() {
            changes.push(format!("collapsed duplicate keys {}", env.duplicates().join(", ")));
        }

        if changes.is_empty() {
            return Ok(format!("{} already valid", path.display()));
        }

        let backup = backup_file(path)?;
        env.save(path)?;
        let detail = changes.join("; ");
        Ok(match backup {
            Some(backup) => format!("{detail} (backup at {})", backup.display()),
            None => detail,
        })
    }
}

// ============================================================================
// Container Lifecycle
// ============================================================================

/// Start a container through compose when it is not running and wait for
/// it to become ready within a bounded number of polls.
pub struct EnsureContainerRunning {
    step_name: &'static str,
    runner: Arc<dyn ProcessRunner>,
    catalog: CommandCatalog,
    sleeper: Arc<dyn Sleeper>,
    container: String,
    service: String,
    compose_file: Option<PathBuf>,
    /// Extra readiness probe run inside the container
    ready_check: Option<Vec<String>>,
    max_retries: u32,
    poll: Duration,
    timeout: Duration,
}

impl EnsureContainerRunning {
    /// The upstream database container, ready once its readiness check passes.
    pub fn database(
        runner: Arc<dyn ProcessRunner>,
        catalog: CommandCatalog,
        sleeper: Arc<dyn Sleeper>,
        config: &DatabaseConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            step_name: "ensure-database",
            runner,
            catalog,
            sleeper,
            container: config.database_container.clone(),
            service: config.database_service.clone(),
            compose_file: config.compose_file.clone(),
            ready_check: Some(config.database_ready_check.clone()).filter(|c| !c.is_empty()),
            max_retries: config.readiness_max_retries,
            poll: config.readiness_poll(),
            timeout,
        }
    }

    /// The dependent application container, ready once it is running.
    pub fn application(
        runner: Arc<dyn ProcessRunner>,
        catalog: CommandCatalog,
        sleeper: Arc<dyn Sleeper>,
        config: &DatabaseConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            step_name: "ensure-application",
            runner,
            catalog,
            sleeper,
            container: config.app_container.clone(),
            service: config.app_service.clone(),
            compose_file: config.compose_file.clone(),
            ready_check: None,
            max_retries: config.readiness_max_retries,
            poll: config.readiness_poll(),
            timeout,
        }
    }

    async fn is_running(&self) -> bool {
        let chain = self.catalog.commands(&Operation::ContainerRunning {
            name: &self.container,
        });
        match run_first_success(self.runner.as_ref(), &chain, self.timeout).await {
            Ok((_, output)) => output.stdout.lines().any(|l| l.trim() == self.container),
            Err(e) => {
                debug!(container = %self.container, error = %e, "Container listing failed");
                false
            }
        }
    }

    async fn is_ready(&self) -> bool {
        if !self.is_running().await {
            return false;
        }
        let Some(argv) = &self.ready_check else {
            return true;
        };
        let chain = self.catalog.commands(&Operation::Exec {
            container: &self.container,
            argv,
        });
        run_first_success(self.runner.as_ref(), &chain, self.timeout)
            .await
            .is_ok()
    }
}

#[async_trait]
impl RepairStep for EnsureContainerRunning {
    fn name(&self) -> &'static str {
        self.step_name
    }

    async fn run(&self) -> Result<String, RepairError> {
        if self.is_running().await {
            return Ok(format!("{} already running", self.container));
        }

        let start = self.catalog.commands(&Operation::ComposeUp {
            service: &self.service,
            compose_file: self.compose_file.as_deref(),
        });
        let (index, _) = run_first_success(self.runner.as_ref(), &start, self.timeout).await?;
        debug!(container = %self.container, command = %start[index], "Start command accepted");

        for attempt in 1..=self.max_retries {
            if self.is_ready().await {
                return Ok(format!(
                    "started {} via `{}`, ready after {attempt} checks",
                    self.container, start[index]
                ));
            }
            if attempt < self.max_retries {
                self.sleeper.sleep(self.poll).await;
            }
        }
        Err(RepairError::DependencyDown {
            name: self.container.clone(),
            attempts: self.max_retries,
        })
    }
}

// ============================================================================
// Management Commands
// ============================================================================

/// Run one of the application's management commands inside its container.
pub struct ManagementCommand {
    step_name: &'static str,
    runner: Arc<dyn ProcessRunner>,
    catalog: CommandCatalog,
    container: String,
    argv: Vec<String>,
    timeout: Duration,
}

impl ManagementCommand {
    pub fn new(
        step_name: &'static str,
        runner: Arc<dyn ProcessRunner>,
        catalog: CommandCatalog,
        container: impl Into<String>,
        argv: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            step_name,
            runner,
            catalog,
            container: container.into(),
            argv,
            timeout,
        }
    }
}

#[async_trait]
impl RepairStep for ManagementCommand {
    fn name(&self) -> &'static str {
        self.step_name
    }

    async fn run(&self) -> Result<String, RepairError> {
        let chain = self.catalog.commands(&Operation::Exec {
            container: &self.container,
            argv: &self.argv,
        });
        let mut last = None;
        for spec in &chain {
            match run_checked(self.runner.as_ref(), spec, self.timeout).await {
                Ok(output) => {
                    let tail = output.stdout.lines().last().unwrap_or("").trim().to_string();
                    return Ok(if tail.is_empty() {
                        format!("`{}` succeeded", self.argv.join(" "))
                    } else {
                        tail
                    });
                }
                Err(e) => last = Some(e),
            }
        }
        Err(last
            .map(RepairError::from)
            .unwrap_or_else(|| RepairError::Verification("no exec command available".to_string())))
    }
}
