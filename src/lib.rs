//! depwarden: self-healing dependency health
//!
//! Keeps a container runtime, its image registries and a dependent
//! application's database configuration reachable and correctly configured.
//!
//! ## Architecture
//!
//! - **Health Monitor**: network/registry probes on a fixed interval, escalating to repair
//! - **Config Validator**: four-stage validation of the dependent service and its database
//! - **Repair Orchestrator**: ordered best-effort remediation, one instance per target
//! - **Retry Puller**: image pulls with exponential backoff and strategy rotation
//! - **Process Runner**: the single boundary to external commands

pub mod background;
pub mod config;
pub mod health;
pub mod process;
pub mod puller;
pub mod repair;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod validator;
pub mod warden;

// Re-export configuration
pub use config::{ConfigError, RegistryMirror, WardenConfig};

// Re-export the monitors and their results
pub use health::{DetailedNetworkStatus, HealthMonitor, HealthStatus};
pub use validator::{ConfigValidator, ValidationResult};

// Re-export repair and retry
pub use puller::RetryPuller;
pub use repair::{RepairOrchestrator, RepairOutcome, RepairReport};

// Re-export scheduling and events
pub use background::{
    EventKind, EventSink, MonitorEvent, MonitorHandle, MonitorKind, MonitorPhase, MonitorState,
};

pub use warden::{Seams, Warden};
