//! Network and registry health
//!
//! [`ProbeSet`] runs the individual checks; [`HealthMonitor`] aggregates them
//! into a [`HealthStatus`] each tick and escalates to the network repair
//! pipeline.

mod monitor;
mod probes;
mod types;

pub use monitor::HealthMonitor;
pub use probes::{EnvLookup, ProbeSet, ProcessEnv, RuntimeSummary};
pub use types::{DetailedNetworkStatus, HealthStatus};
