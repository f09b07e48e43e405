//! Network health monitor: probe, escalate, repair.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use super::probes::ProbeSet;
use super::types::{DetailedNetworkStatus, HealthStatus};
use crate::background::{
    spawn_periodic, EventKind, EventSink, MonitorEvent, MonitorHandle, MonitorKind, MonitorLog,
    MonitorState, PeriodicTask, Ticker,
};
use crate::repair::{parse_nameservers, RepairOrchestrator, RepairOutcome};

pub struct HealthMonitor {
    probes: Arc<ProbeSet>,
    repair: Arc<RepairOrchestrator>,
    events: Arc<dyn EventSink>,
    log: MonitorLog,
    state: Mutex<MonitorState>,
    last: RwLock<Option<HealthStatus>>,
}

impl HealthMonitor {
    pub fn new(
        probes: Arc<ProbeSet>,
        repair: Arc<RepairOrchestrator>,
        events: Arc<dyn EventSink>,
        log: MonitorLog,
        failure_threshold: u32,
    ) -> Self {
        Self {
            probes,
            repair,
            events,
            log,
            state: Mutex::new(MonitorState::new(failure_threshold)),
            last: RwLock::new(None),
        }
    }

    /// Run the full probe set once and cache the result.
    ///
    /// Does not touch the failure counter; only ticks escalate.
    pub async fn check_network_health(&self) -> HealthStatus {
        let start = Instant::now();
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let internet_connected = match self.probes.connectivity().await {
            Ok(_) => true,
            Err(e) => {
                errors.push(format!("No internet connectivity: {e}"));
                false
            }
        };

        let dns_resolution = match self.probes.dns_resolution().await {
            Ok(_) => true,
            Err(e) => {
                errors.push(format!("DNS resolution failed: {e}"));
                false
            }
        };

        let proxy_sources = self.probes.detect_proxy().await;
        let proxy_detected = !proxy_sources.is_empty();
        if proxy_detected {
            warnings.push(format!("Proxy configured via {}", proxy_sources.join(", ")));
        }

        let registry_reachable = match self.probes.registry().await {
            Ok(_) => true,
            Err(e) => {
                errors.push(format!("Container registry unreachable: {e}"));
                false
            }
        };

        let registry_mirrors: Vec<String> = self
            .probes
            .reachable_mirrors()
            .await
            .into_iter()
            .map(|m| m.name)
            .collect();
        if registry_mirrors.is_empty() && !self.probes.config().mirrors.is_empty() {
            warnings.push("No registry mirrors reachable".to_string());
        }

        let status = HealthStatus {
            internet_connected,
            dns_resolution,
            proxy_detected,
            registry_reachable,
            registry_mirrors,
            latency: start.elapsed(),
            last_error: errors.last().cloned(),
            errors,
            warnings,
            checked_at: Utc::now(),
        };

        if status.is_healthy() {
            self.log.info(format!(
                "Network healthy ({}ms, {} mirrors reachable)",
                status.latency.as_millis(),
                status.registry_mirrors.len()
            ));
        } else {
            self.log
                .warn(format!("Network check failed: {}", status.errors.join("; ")));
        }
        for warning in &status.warnings {
            self.log.warn(warning);
        }

        *self.last.write().await = Some(status.clone());
        status
    }

    /// One scheduled cycle: probe, update the failure counter, emit events
    /// and repair when the threshold is crossed.
    pub async fn tick(&self) {
        let status = self.check_network_health().await;
        let escalation = self.state.lock().await.observe(!status.is_healthy());

        for event in escalation.events(MonitorKind::Network, &status.errors.join("; ")) {
            self.events.emit(event);
        }
        if escalation.requires_repair() {
            self.repair_network().await;
        }
    }

    /// Run the network repair pipeline and report its outcome as an event.
    ///
    /// Convergence is confirmed by the next tick, not here.
    pub async fn repair_network(&self) -> RepairOutcome {
        self.state.lock().await.begin_repair();
        let outcome = self.repair.repair().await;
        self.state.lock().await.end_repair();

        if let RepairOutcome::Completed(report) = &outcome {
            let (kind, message) = if report.success() {
                (EventKind::RepairSucceeded, "Network repair completed".to_string())
            } else {
                let failed: Vec<&str> = report.failed_steps().map(|s| s.step).collect();
                (
                    EventKind::RepairFailed,
                    format!("Network repair steps failed: {}", failed.join(", ")),
                )
            };
            self.events
                .emit(MonitorEvent::new(MonitorKind::Network, kind, message));
        }
        outcome
    }

    /// Most recent cached result, `None` before the first check.
    pub async fn last_health_status(&self) -> Option<HealthStatus> {
        self.last.read().await.clone()
    }

    pub async fn state(&self) -> MonitorState {
        self.state.lock().await.clone()
    }

    /// Latest status (or a fresh check) plus environment diagnostics.
    pub async fn detailed_network_status(&self) -> DetailedNetworkStatus {
        let status = match self.last_health_status().await {
            Some(status) => status,
            None => self.check_network_health().await,
        };
        let nameservers = std::fs::read_to_string(&self.probes.config().resolver_config)
            .map(|text| parse_nameservers(&text))
            .unwrap_or_default();
        let state = self.state().await;

        DetailedNetworkStatus {
            status,
            proxy_env: self.probes.proxy_env(),
            nameservers,
            runtime: self.probes.runtime_summary().await,
            phase: state.phase,
            consecutive_failures: state.consecutive_failures,
        }
    }

    /// Tick on `ticker` until the handle is stopped. With an interval ticker
    /// the first check runs immediately.
    pub fn start_monitoring(
        self: &Arc<Self>,
        ticker: Box<dyn Ticker>,
        cancel: CancellationToken,
    ) -> MonitorHandle {
        self.log.info("Network monitoring started");
        spawn_periodic(Arc::clone(self), ticker, cancel)
    }
}

#[async_trait]
impl PeriodicTask for HealthMonitor {
    fn task_name(&self) -> &'static str {
        "network"
    }

    async fn run_tick(&self) {
        self.tick().await;
    }
}
