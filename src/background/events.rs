//! Monitor state-change events.
//!
//! Monitors emit through the [`EventSink`] trait. Emission never blocks and
//! never fails from the caller's point of view. Within one monitor the
//! events leave in tick order; ordering across subscribers is not defined.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Capacity of the broadcast channel before slow subscribers start lagging.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Which monitored target an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorKind {
    Network,
    Database,
}

impl fmt::Display for MonitorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Database => write!(f, "database"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// A tick failed
    Degraded { consecutive_failures: u32 },
    /// Failures crossed the threshold; repair is about to run
    Critical { consecutive_failures: u32 },
    /// First clean tick after one or more failures
    Restored,
    RepairSucceeded,
    RepairFailed,
}

impl EventKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Degraded { .. } => "degraded",
            Self::Critical { .. } => "critical",
            Self::Restored => "restored",
            Self::RepairSucceeded => "repair-success",
            Self::RepairFailed => "repair-failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitorEvent {
    pub monitor: MonitorKind,
    #[serde(flatten)]
    pub kind: EventKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl MonitorEvent {
    pub fn new(monitor: MonitorKind, kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            monitor,
            kind,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Fire-and-forget event consumer.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: MonitorEvent);
}

/// Broadcast channel sink; each subscriber receives every event in order.
#[derive(Clone)]
pub struct BroadcastEventSink {
    tx: broadcast::Sender<MonitorEvent>,
}

impl BroadcastEventSink {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for BroadcastEventSink {
    fn emit(&self, event: MonitorEvent) {
        // No subscribers is not an error.
        let _ = self.tx.send(event);
    }
}

/// Sink that writes every event to `tracing` at a level matching its severity.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn emit(&self, event: MonitorEvent) {
        let monitor = event.monitor;
        let kind = event.kind.label();
        match event.kind {
            EventKind::Critical { .. } | EventKind::RepairFailed => {
                error!(%monitor, event = kind, "{}", event.message);
            }
            EventKind::Degraded { .. } => warn!(%monitor, event = kind, "{}", event.message),
            EventKind::Restored | EventKind::RepairSucceeded => {
                info!(%monitor, event = kind, "{}", event.message);
            }
        }
    }
}

/// Delivers each event to every inner sink, in registration order.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, event: MonitorEvent) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.emit(event.clone());
            }
            last.emit(event);
        }
    }
}
