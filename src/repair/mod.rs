//! Best-effort repair pipelines
//!
//! A [`RepairOrchestrator`] owns an ordered list of [`RepairStep`]s for one
//! monitored target. Every step is attempted; a failing step is logged as a
//! warning and the pipeline moves on. Only one repair per target runs at a
//! time because the steps rewrite shared on-disk configuration.

pub mod database;
pub mod network;

pub use database::{ConfigFileRepair, EnsureContainerRunning, ManagementCommand};
pub use network::{parse_nameservers, DaemonConfigRepair, DaemonRestart, DnsRepair};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::sync::Mutex;

use crate::background::MonitorLog;
use crate::process::ProcessError;
use crate::validator::EnvFileError;

/// Errors raised by individual repair steps.
#[derive(Debug, thiserror::Error)]
pub enum RepairError {
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error("{action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    EnvFile(#[from] EnvFileError),
    #[error("`{name}` not ready after {attempts} checks")]
    DependencyDown { name: String, attempts: u32 },
    #[error("verification failed: {0}")]
    Verification(String),
}

impl RepairError {
    pub(crate) fn io(action: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// One idempotent remediation action.
#[async_trait]
pub trait RepairStep: Send + Sync {
    fn name(&self) -> &'static str;

    /// Perform the step, returning a short human-readable detail.
    async fn run(&self) -> Result<String, RepairError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub step: &'static str,
    pub ok: bool,
    pub detail: String,
}

/// Result of one `repair()` invocation.
#[derive(Debug, Clone, Serialize)]
pub struct RepairReport {
    pub target: &'static str,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub steps: Vec<StepOutcome>,
}

impl RepairReport {
    /// True iff every step succeeded.
    pub fn success(&self) -> bool {
        self.steps.iter().all(|s| s.ok)
    }

    pub fn failed_steps(&self) -> impl Iterator<Item = &StepOutcome> {
        self.steps.iter().filter(|s| !s.ok)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RepairOutcome {
    Completed(RepairReport),
    /// Another repair for the same target was in progress; nothing ran
    AlreadyRunning,
}

impl RepairOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Completed(report) if report.success())
    }

    pub fn report(&self) -> Option<&RepairReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::AlreadyRunning => None,
        }
    }
}

/// Ordered best-effort repair pipeline for one target.
pub struct RepairOrchestrator {
    target: &'static str,
    steps: Vec<Box<dyn RepairStep>>,
    log: MonitorLog,
    in_repair: Mutex<()>,
}

impl RepairOrchestrator {
    pub fn new(target: &'static str, steps: Vec<Box<dyn RepairStep>>, log: MonitorLog) -> Self {
        Self {
            target,
            steps,
            log,
            in_repair: Mutex::new(()),
        }
    }

    pub fn target(&self) -> &'static str {
        self.target
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    pub fn is_running(&self) -> bool {
        self.in_repair.try_lock().is_err()
    }

    /// Run every step in order.
    ///
    /// Returns [`RepairOutcome::AlreadyRunning`] without touching anything
    /// when a repair for this target is already in progress.
    pub async fn repair(&self) -> RepairOutcome {
        let Ok(_guard) = self.in_repair.try_lock() else {
            self.log
                .warn(format!("Repair of {} already in progress, skipping", self.target));
            return RepairOutcome::AlreadyRunning;
        };

        let started_at = Utc::now();
        let start = Instant::now();
        self.log.info(format!(
            "Starting {} repair ({} steps)",
            self.target,
            self.steps.len()
        ));

        let mut outcomes = Vec::with_capacity(self.steps.len());
        for (index, step) in self.steps.iter().enumerate() {
            let position = index + 1;
            match step.run().await {
                Ok(detail) => {
                    self.log.info(format!(
                        "[{position}/{}] {}: {detail}",
                        self.steps.len(),
                        step.name()
                    ));
                    outcomes.push(StepOutcome {
                        step: step.name(),
                        ok: true,
                        detail,
                    });
                }
                Err(e) => {
                    self.log.warn(format!(
                        "[{position}/{}] {} failed: {e}",
                        self.steps.len(),
                        step.name()
                    ));
                    outcomes.push(StepOutcome {
                        step: step.name(),
                        ok: false,
                        detail: e.to_string(),
                    });
                }
            }
        }

        let report = RepairReport {
            target: self.target,
            started_at,
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            steps: outcomes,
        };
        if report.success() {
            self.log.info(format!("{} repair completed", self.target));
        } else {
            let failed: Vec<&str> = report.failed_steps().map(|s| s.step).collect();
            self.log.warn(format!(
                "{} repair finished with failed steps: {}",
                self.target,
                failed.join(", ")
            ));
        }
        RepairOutcome::Completed(report)
    }
}

/// Copy `path` to `<path>.backup.<timestamp>` next to it.
///
/// Returns `None` when there is nothing to back up.
pub(crate) fn backup_file(path: &Path) -> Result<Option<PathBuf>, RepairError> {
    if !path.exists() {
        return Ok(None);
    }
    let stamp = Utc::now().format("%Y%m%d%H%M%S%3f");
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".backup.{stamp}"));
    let backup = path.with_file_name(name);
    std::fs::copy(path, &backup).map_err(|e| RepairError::io("backing up", path, e))?;
    Ok(Some(backup))
}
