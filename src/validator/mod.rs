//! Dependent-service configuration validator
//!
//! Four stages per cycle:
//!
//! 1. **Config file**: always runs, never short-circuits the rest
//! 2. **Connectivity**: only meaningful with a well-formed connection string
//! 3. **Schema**: only runs when connectivity succeeded
//! 4. **App settings**: always runs, adds issues but does not gate validity
//!
//! `is_valid` is strictly `configuration_valid && connection_working && schema_valid`.

mod connection;
mod env_file;

pub use connection::{ConnectionUrl, ConnectionUrlError};
pub use env_file::{DependencyConfig, EnvFileError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::background::{
    spawn_periodic, EventKind, EventSink, MonitorEvent, MonitorHandle, MonitorKind, MonitorLog,
    MonitorState, PeriodicTask, Ticker,
};
use crate::config::DatabaseConfig;
use crate::process::{run_first_success, CommandCatalog, CommandOutput, Operation, ProcessError, ProcessRunner};
use crate::repair::{RepairOrchestrator, RepairOutcome};

/// Result of one validation cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub connection_working: bool,
    pub schema_valid: bool,
    pub configuration_valid: bool,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
    pub checked_at: DateTime<Utc>,
}

impl ValidationResult {
    pub fn from_stages(
        configuration_valid: bool,
        connection_working: bool,
        schema_valid: bool,
        issues: Vec<String>,
        recommendations: Vec<String>,
    ) -> Self {
        Self {
            is_valid: configuration_valid && connection_working && schema_valid,
            connection_working,
            schema_valid,
            configuration_valid,
            issues,
            recommendations,
            checked_at: Utc::now(),
        }
    }
}

/// Outcome of a single pipeline stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub passed: bool,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
}

impl StageReport {
    fn pass() -> Self {
        Self {
            passed: true,
            ..Self::default()
        }
    }

    fn fail(issue: String, recommendation: String) -> Self {
        Self {
            passed: false,
            issues: vec![issue],
            recommendations: vec![recommendation],
        }
    }
}

/// Outcome of the config-file stage, carrying the parsed connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFileCheck {
    pub is_valid: bool,
    pub connection: Option<ConnectionUrl>,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
}

pub struct ConfigValidator {
    runner: Arc<dyn ProcessRunner>,
    catalog: CommandCatalog,
    config: DatabaseConfig,
    command_timeout: Duration,
    repair: Arc<RepairOrchestrator>,
    events: Arc<dyn EventSink>,
    log: MonitorLog,
    state: Mutex<MonitorState>,
    last: RwLock<Option<ValidationResult>>,
}

impl ConfigValidator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        catalog: CommandCatalog,
        config: DatabaseConfig,
        command_timeout: Duration,
        repair: Arc<RepairOrchestrator>,
        events: Arc<dyn EventSink>,
        log: MonitorLog,
        failure_threshold: u32,
    ) -> Self {
        Self {
            runner,
            catalog,
            config,
            command_timeout,
            repair,
            events,
            log,
            state: Mutex::new(MonitorState::new(failure_threshold)),
            last: RwLock::new(None),
        }
    }

    // ========================================================================
    // Stages
    // ========================================================================

    pub fn validate_config_file(&self) -> ConfigFileCheck {
        let path = &self.config.env_file;
        let key = self.config.connection_key.as_str();
        let shape = "<scheme>://<user>:<password>@<host>:<port>/<database>";

        let env = match DependencyConfig::load(path) {
            Ok(env) => env,
            Err(e) => {
                let recommendation = match &e {
                    EnvFileError::Missing(_) => {
                        format!("Create {} with {key}={shape}", path.display())
                    }
                    _ => format!("Check that {} is readable", path.display()),
                };
                return ConfigFileCheck {
                    is_valid: false,
                    connection: None,
                    issues: vec![e.to_string()],
                    recommendations: vec![recommendation],
                };
            }
        };

        let mut issues = Vec::new();
        let mut recommendations = Vec::new();

        let connection = match env.get(key) {
            None => {
                issues.push(format!("{key} is missing from {}", path.display()));
                recommendations.push(format!("Add {key}={shape} to {}", path.display()));
                None
            }
            Some(value) => match ConnectionUrl::parse(value) {
                Ok(url) => Some(url),
                Err(e) => {
                    issues.push(format!("{key} is malformed: {e}"));
                    recommendations.push(format!("Rewrite {key} as {shape}"));
                    None
                }
            },
        };

        for required in &self.config.required_keys {
            if !env.contains(required) {
                issues.push(format!("Required key {required} is missing"));
                recommendations.push(format!("Add {required} to {}", path.display()));
            }
        }

        let denied: Vec<String> = env
            .list(&self.config.plugin_key)
            .into_iter()
            .filter(|p| self.config.plugin_denylist.contains(p))
            .collect();
        if !denied.is_empty() {
            issues.push(format!(
                "{} enables disallowed plugins: {}",
                self.config.plugin_key,
                denied.join(", ")
            ));
            recommendations.push(format!(
                "Remove {} from {}",
                denied.join(", "),
                self.config.plugin_key
            ));
        }

        if !env.duplicates().is_empty() {
            recommendations.push(format!(
                "Remove duplicate entries for {} (the last value is used)",
                env.duplicates().join(", ")
            ));
        }

        ConfigFileCheck {
            is_valid: issues.is_empty(),
            connection,
            issues,
            recommendations,
        }
    }

    /// Verify the database accepts connections, from inside the app container.
    pub async fn test_connection(&self, url: &ConnectionUrl) -> StageReport {
        let argv = url.fill_template(&self.config.connection_check);
        match self.exec(&self.config.app_container, &argv, self.command_timeout).await {
            Ok(_) => StageReport::pass(),
            Err(e) => StageReport::fail(
                format!("Database connection to {}:{} failed: {e}", url.host, url.port),
                format!(
                    "Check that {} is running and accepts connections for {}",
                    self.config.database_container, url
                ),
            ),
        }
    }

    /// Fails when any migration is still unapplied.
    pub async fn validate_schema(&self) -> StageReport {
        let timeout = self.config.management_timeout();
        match self.exec(&self.config.app_container, &self.config.schema_check, timeout).await {
            Ok(output) => {
                let pending = output
                    .stdout
                    .lines()
                    .filter(|l| l.contains(self.config.pending_marker.as_str()))
                    .count();
                if pending == 0 {
                    StageReport::pass()
                } else {
                    StageReport::fail(
                        format!("{pending} unapplied migrations"),
                        format!("Run `{}`", self.config.migrate_command.join(" ")),
                    )
                }
            }
            Err(e) => StageReport::fail(
                format!("Schema check failed: {e}"),
                format!("Run `{}`", self.config.migrate_command.join(" ")),
            ),
        }
    }

    /// The application's own configuration self-check.
    pub async fn validate_app_settings(&self) -> StageReport {
        let timeout = self.config.management_timeout();
        let command = self.config.self_check_command.join(" ");
        match self.exec(&self.config.app_container, &self.config.self_check_command, timeout).await {
            Ok(output) if output.stdout.contains("WARNING") || output.stderr.contains("WARNING") => {
                StageReport {
                    passed: true,
                    issues: Vec::new(),
                    recommendations: vec![format!("Review warnings reported by `{command}`")],
                }
            }
            Ok(_) => StageReport::pass(),
            Err(e) => StageReport::fail(
                format!("Application self-check failed: {e}"),
                format!("Run `{command}` in {} for details", self.config.app_container),
            ),
        }
    }

    // ========================================================================
    // Pipeline
    // ========================================================================

    /// Run all four stages once and cache the result.
    pub async fn validate_database_configuration(&self) -> ValidationResult {
        let file = self.validate_config_file();
        let mut issues = file.issues;
        let mut recommendations = file.recommendations;
        let mut absorb = |stage: StageReport| {
            issues.extend(stage.issues);
            recommendations.extend(stage.recommendations);
            stage.passed
        };

        let connection_working = match &file.connection {
            Some(url) => absorb(self.test_connection(url).await),
            None => absorb(StageReport::fail(
                "Connection test skipped: no valid connection string".to_string(),
                format!("Fix {} first", self.config.connection_key),
            )),
        };

        let schema_valid = connection_working && absorb(self.validate_schema().await);

        absorb(self.validate_app_settings().await);

        let result = ValidationResult::from_stages(
            file.is_valid,
            connection_working,
            schema_valid,
            issues,
            recommendations,
        );

        if result.is_valid {
            self.log.info("Database configuration valid");
        } else {
            self.log.warn(format!(
                "Database configuration invalid (config={}, connection={}, schema={}): {}",
                result.configuration_valid,
                result.connection_working,
                result.schema_valid,
                result.issues.join("; ")
            ));
        }

        *self.last.write().await = Some(result.clone());
        result
    }

    /// Run the repair pipeline, re-validate once and report the outcome.
    ///
    /// Emits exactly one repair-success or repair-failed event per completed
    /// repair. Returns `false` without emitting when a repair is already running.
    pub async fn repair_database_configuration(&self) -> bool {
        self.state.lock().await.begin_repair();
        let outcome = self.repair.repair().await;
        self.state.lock().await.end_repair();

        if matches!(outcome, RepairOutcome::AlreadyRunning) {
            return false;
        }

        let result = self.validate_database_configuration().await;
        let event = if result.is_valid {
            MonitorEvent::new(
                MonitorKind::Database,
                EventKind::RepairSucceeded,
                "Database configuration repaired",
            )
        } else {
            MonitorEvent::new(
                MonitorKind::Database,
                EventKind::RepairFailed,
                format!("Database still invalid after repair: {}", result.issues.join("; ")),
            )
        };
        self.events.emit(event);
        result.is_valid
    }

    /// One scheduled cycle: validate, escalate, repair at the threshold.
    pub async fn tick(&self) {
        let result = self.validate_database_configuration().await;
        let escalation = self.state.lock().await.observe(!result.is_valid);

        for event in escalation.events(MonitorKind::Database, &result.issues.join("; ")) {
            self.events.emit(event);
        }
        if escalation.requires_repair() {
            self.repair_database_configuration().await;
        }
    }

    pub async fn last_validation_result(&self) -> Option<ValidationResult> {
        self.last.read().await.clone()
    }

    pub async fn state(&self) -> MonitorState {
        self.state.lock().await.clone()
    }

    pub fn start_monitoring(
        self: &Arc<Self>,
        ticker: Box<dyn Ticker>,
        cancel: CancellationToken,
    ) -> MonitorHandle {
        self.log.info("Database validation started");
        spawn_periodic(Arc::clone(self), ticker, cancel)
    }

    async fn exec(
        &self,
        container: &str,
        argv: &[String],
        timeout: Duration,
    ) -> Result<CommandOutput, ProcessError> {
        let chain = self.catalog.commands(&Operation::Exec { container, argv });
        run_first_success(self.runner.as_ref(), &chain, timeout)
            .await
            .map(|(_, output)| output)
    }
}

#[async_trait]
impl PeriodicTask for ConfigValidator {
    fn task_name(&self) -> &'static str {
        "database"
    }

    async fn run_tick(&self) {
        self.tick().await;
    }
}
