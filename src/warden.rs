//! Service wiring
//!
//! Builds both monitors, their repair pipelines and the puller from one
//! [`WardenConfig`]. Every external effect goes through a [`Seams`] value so
//! the whole graph can be assembled against fakes.

use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::background::{
    BroadcastEventSink, EventSink, FanoutSink, IntervalTicker, LogEventSink, MonitorEvent,
    MonitorHandle, MonitorLog, Sleeper, TokioSleeper,
};
use crate::config::WardenConfig;
use crate::health::{EnvLookup, HealthMonitor, ProbeSet, ProcessEnv};
use crate::process::{CommandCatalog, ProcessRunner, SystemProcessRunner};
use crate::puller::RetryPuller;
use crate::repair::{
    ConfigFileRepair, DaemonConfigRepair, DaemonRestart, DnsRepair, EnsureContainerRunning,
    ManagementCommand, RepairOrchestrator, RepairStep,
};
use crate::validator::ConfigValidator;

/// External effects shared by every service.
#[derive(Clone)]
pub struct Seams {
    pub runner: Arc<dyn ProcessRunner>,
    pub catalog: CommandCatalog,
    pub sleeper: Arc<dyn Sleeper>,
    pub env: Arc<dyn EnvLookup>,
}

impl Seams {
    /// Real processes, real time and the process environment.
    pub fn system(config: &WardenConfig) -> Self {
        Self {
            runner: Arc::new(SystemProcessRunner::new()),
            catalog: CommandCatalog::for_host(&config.runtime.binary, &config.pull.platform),
            sleeper: Arc::new(TokioSleeper),
            env: Arc::new(ProcessEnv),
        }
    }
}

/// Handles to the two running monitor loops.
pub struct RunningMonitors {
    pub network: MonitorHandle,
    pub database: MonitorHandle,
}

impl RunningMonitors {
    pub fn stop(&self) {
        self.network.stop();
        self.database.stop();
    }
}

pub struct Warden {
    config: WardenConfig,
    network: Arc<HealthMonitor>,
    database: Arc<ConfigValidator>,
    puller: RetryPuller,
    broadcast: BroadcastEventSink,
}

impl Warden {
    pub fn new(config: WardenConfig) -> Self {
        let seams = Seams::system(&config);
        Self::with_seams(config, seams)
    }

    pub fn with_seams(config: WardenConfig, seams: Seams) -> Self {
        let broadcast = BroadcastEventSink::new();
        let events: Arc<dyn EventSink> = Arc::new(
            FanoutSink::new()
                .with(Arc::new(broadcast.clone()))
                .with(Arc::new(LogEventSink)),
        );

        let log_dir = config.monitor.log_dir.as_path();
        let network_log = MonitorLog::new(log_dir, "network");
        let database_log = MonitorLog::new(log_dir, "database");
        let command_timeout = config.runtime.command_timeout();

        let probes = Arc::new(ProbeSet::new(
            seams.runner.clone(),
            seams.catalog.clone(),
            seams.env.clone(),
            config.network.clone(),
        ));

        let network_steps: Vec<Box<dyn RepairStep>> = vec![
            Box::new(DnsRepair::new(
                seams.runner.clone(),
                seams.catalog.clone(),
                command_timeout,
                config.network.resolver_config.clone(),
                config.network.fallback_nameservers.clone(),
            )),
            Box::new(DaemonConfigRepair::new(probes.clone(), &config.runtime)),
            Box::new(DaemonRestart::new(
                seams.runner.clone(),
                seams.catalog.clone(),
                seams.sleeper.clone(),
                config.runtime.settle(),
                command_timeout,
            )),
        ];
        let network_repair = Arc::new(RepairOrchestrator::new(
            "network",
            network_steps,
            network_log.clone(),
        ));

        let db = &config.database;
        let database_steps: Vec<Box<dyn RepairStep>> = vec![
            Box::new(ConfigFileRepair::new(db.clone())),
            Box::new(EnsureContainerRunning::database(
                seams.runner.clone(),
                seams.catalog.clone(),
                seams.sleeper.clone(),
                db,
                command_timeout,
            )),
            Box::new(EnsureContainerRunning::application(
                seams.runner.clone(),
                seams.catalog.clone(),
                seams.sleeper.clone(),
                db,
                command_timeout,
            )),
            Box::new(ManagementCommand::new(
                "migrate",
                seams.runner.clone(),
                seams.catalog.clone(),
                db.app_container.clone(),
                db.migrate_command.clone(),
                db.management_timeout(),
            )),
            Box::new(ManagementCommand::new(
                "self-check",
                seams.runner.clone(),
                seams.catalog.clone(),
                db.app_container.clone(),
                db.self_check_command.clone(),
                db.management_timeout(),
            )),
        ];
        let database_repair = Arc::new(RepairOrchestrator::new(
            "database",
            database_steps,
            database_log.clone(),
        ));

        let network = Arc::new(HealthMonitor::new(
            probes,
            network_repair.clone(),
            events.clone(),
            network_log,
            config.monitor.failure_threshold,
        ));

        let database = Arc::new(ConfigValidator::new(
            seams.runner.clone(),
            seams.catalog.clone(),
            db.clone(),
            command_timeout,
            database_repair,
            events,
            database_log,
            config.monitor.failure_threshold,
        ));

        // Shares the network pipeline so a pull-triggered repair and a
        // monitor-triggered repair never overlap.
        let puller = RetryPuller::new(
            seams.runner,
            seams.catalog,
            seams.sleeper,
            network_repair,
            config.pull.clone(),
        );

        Self {
            config,
            network,
            database,
            puller,
            broadcast,
        }
    }

    pub fn config(&self) -> &WardenConfig {
        &self.config
    }

    pub fn network(&self) -> &Arc<HealthMonitor> {
        &self.network
    }

    pub fn database(&self) -> &Arc<ConfigValidator> {
        &self.database
    }

    pub fn puller(&self) -> &RetryPuller {
        &self.puller
    }

    /// Receive every event emitted from now on, in per-monitor order.
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.broadcast.subscribe()
    }

    /// Start both monitor loops on their configured intervals.
    ///
    /// Each loop gets a child of `cancel`, so cancelling it stops both.
    pub fn start(&self, cancel: &CancellationToken) -> RunningMonitors {
        info!(
            network_interval_secs = self.config.monitor.interval_secs,
            database_interval_secs = self.config.database.validation_interval_secs,
            threshold = self.config.monitor.failure_threshold,
            "Starting monitors"
        );
        RunningMonitors {
            network: self.network.start_monitoring(
                Box::new(IntervalTicker::new(self.config.monitor.interval())),
                cancel.child_token(),
            ),
            database: self.database.start_monitoring(
                Box::new(IntervalTicker::new(self.config.database.validation_interval())),
                cancel.child_token(),
            ),
        }
    }
}
