//! Deterministic fakes for the injected seams.
//!
//! Compiled for unit tests and behind the `test-util` feature, which the
//! integration tests under `tests/` enable.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::background::{EventKind, EventSink, MonitorEvent, Sleeper};
use crate::health::EnvLookup;
use crate::process::{CommandOutput, CommandSpec, ProcessError, ProcessRunner};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type Handler = dyn Fn(&CommandSpec) -> Result<CommandOutput, ProcessError> + Send + Sync;

/// Process runner answering from a closure and recording every command.
pub struct ScriptedRunner {
    handler: Box<Handler>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&CommandSpec) -> Result<CommandOutput, ProcessError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every command exits 0 with empty output.
    pub fn succeed_all() -> Self {
        Self::new(|_| Ok(CommandOutput::ok("")))
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        lock(&self.calls).clone()
    }

    /// Number of recorded commands whose rendering contains `needle`.
    pub fn count_matching(&self, needle: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| c.to_string().contains(needle))
            .count()
    }

    pub fn clear(&self) {
        lock(&self.calls).clear();
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec, _timeout: Duration) -> Result<CommandOutput, ProcessError> {
        lock(&self.calls).push(spec.clone());
        (self.handler)(spec)
    }
}

/// Sleeper that records requested durations and returns immediately.
#[derive(Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<Duration> {
        lock(&self.sleeps).clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        lock(&self.sleeps).push(duration);
        tokio::task::yield_now().await;
    }
}

/// Event sink that keeps every event in emission order.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<MonitorEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MonitorEvent> {
        lock(&self.events).clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        lock(&self.events).iter().map(|e| e.kind.clone()).collect()
    }

    /// Number of events with the given label (`"critical"`, `"repair-success"`, ...).
    pub fn count(&self, label: &str) -> usize {
        lock(&self.events)
            .iter()
            .filter(|e| e.kind.label() == label)
            .count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: MonitorEvent) {
        lock(&self.events).push(event);
    }
}

/// Environment lookup backed by a map.
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: HashMap<String, String>,
}

impl MapEnv {
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self {
            vars: pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }
}

impl EnvLookup for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}
