//! Cancellable tick scheduler shared by both monitors.
//!
//! A monitor implements [`PeriodicTask`]; [`spawn_periodic`] drives it from a
//! [`Ticker`] on its own tokio task until the returned [`MonitorHandle`] is
//! stopped. Stopping only stops future ticks: a tick already running (and
//! any repair it started) is allowed to finish.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Source of tick signals.
#[async_trait]
pub trait Ticker: Send {
    /// Wait for the next tick. `false` means the source is exhausted.
    async fn tick(&mut self) -> bool;
}

/// Production ticker: fixed interval, first tick immediate.
///
/// Missed ticks are delayed rather than bursted, so a slow probe run never
/// causes back-to-back ticks.
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) -> bool {
        self.interval.tick().await;
        true
    }
}

/// Ticker driven by hand through a [`ManualTickHandle`].
pub struct ManualTicker {
    rx: mpsc::UnboundedReceiver<()>,
}

/// Sending side of a [`ManualTicker`]. Dropping every handle exhausts the ticker.
#[derive(Clone)]
pub struct ManualTickHandle {
    tx: mpsc::UnboundedSender<()>,
}

impl ManualTicker {
    pub fn new() -> (Self, ManualTickHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, ManualTickHandle { tx })
    }
}

impl ManualTickHandle {
    /// Queue one tick. Returns `false` once the ticker is gone.
    pub fn tick(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

#[async_trait]
impl Ticker for ManualTicker {
    async fn tick(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }
}

/// Work performed once per tick.
#[async_trait]
pub trait PeriodicTask: Send + Sync + 'static {
    fn task_name(&self) -> &'static str;

    async fn run_tick(&self);
}

/// Handle to a running monitor loop.
pub struct MonitorHandle {
    name: &'static str,
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl MonitorHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Stop scheduling new ticks. An in-flight tick still completes.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait for the loop to exit (after `stop()` or ticker exhaustion).
    pub async fn join(self) -> Result<(), tokio::task::JoinError> {
        self.join.await
    }
}

/// Spawn `task` onto its own tokio task, ticking from `ticker`.
///
/// `cancel` is usually a child of the process-wide shutdown token.
pub fn spawn_periodic<T: PeriodicTask>(
    task: Arc<T>,
    mut ticker: Box<dyn Ticker>,
    cancel: CancellationToken,
) -> MonitorHandle {
    let name = task.task_name();
    let token = cancel.clone();
    let join = tokio::spawn(async move {
        info!(monitor = name, "Monitor loop started");
        let mut ticks: u64 = 0;
        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => {
                    info!(monitor = name, ticks, "Monitor loop stopped");
                    break;
                }
                more = ticker.tick() => {
                    if !more {
                        info!(monitor = name, ticks, "Ticker exhausted, monitor loop exiting");
                        break;
                    }
                    ticks += 1;
                    debug!(monitor = name, tick = ticks, "Tick");
                    // Runs outside the select: cancellation cannot interrupt it.
                    task.run_tick().await;
                }
            }
        }
    });

    MonitorHandle { name, cancel, join }
}
