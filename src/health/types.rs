use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::time::Duration;

use super::probes::RuntimeSummary;
use crate::background::MonitorPhase;

/// Aggregated result of one network/registry probe run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthStatus {
    pub internet_connected: bool,
    pub dns_resolution: bool,
    pub proxy_detected: bool,
    pub registry_reachable: bool,
    /// Names of reachable mirrors, in priority order
    pub registry_mirrors: Vec<String>,
    /// Wall-clock duration of the whole probe run
    #[serde(rename = "latency_ms", serialize_with = "serialize_millis")]
    pub latency: Duration,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub last_error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }
}

fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Health snapshot plus environment diagnostics, for the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct DetailedNetworkStatus {
    pub status: HealthStatus,
    /// Proxy variables that are set
    pub proxy_env: BTreeMap<String, String>,
    /// `nameserver` entries of the resolver config
    pub nameservers: Vec<String>,
    pub runtime: Option<RuntimeSummary>,
    pub phase: Option<MonitorPhase>,
    pub consecutive_failures: u32,
}
