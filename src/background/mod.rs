//! Background services: tick scheduling, escalation, events and monitor logs
//!
//! Both monitors run as independent tokio tasks built from these pieces.
//! Nothing here knows what is being monitored.

pub mod clock;
pub mod escalation;
pub mod events;
pub mod monitor_log;
pub mod scheduler;

pub use clock::{Sleeper, TokioSleeper};
pub use escalation::{Escalation, MonitorPhase, MonitorState};
pub use events::{
    BroadcastEventSink, EventKind, EventSink, FanoutSink, LogEventSink, MonitorEvent, MonitorKind,
};
pub use monitor_log::{LogLevel, MonitorLog};
pub use scheduler::{
    spawn_periodic, IntervalTicker, ManualTickHandle, ManualTicker, MonitorHandle, PeriodicTask,
    Ticker,
};
