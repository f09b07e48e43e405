//! Consecutive-failure tracking shared by both monitors.
//!
//! A failing tick increments the counter; a clean tick resets it. Repair is
//! requested once, on the tick the counter reaches the threshold. The counter
//! keeps climbing while the failure persists; only a clean tick re-arms.

use serde::Serialize;
use std::fmt;

use super::events::{EventKind, MonitorEvent, MonitorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorPhase {
    Healthy,
    Degraded,
    Repairing,
    /// Failures persisted past a repair cycle
    Critical,
}

impl fmt::Display for MonitorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "HEALTHY"),
            Self::Degraded => write!(f, "DEGRADED"),
            Self::Repairing => write!(f, "REPAIRING"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// What the monitor should do after observing one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// Clean tick, nothing was failing before
    Steady,
    /// Clean tick after `previous_failures` failing ticks
    Restored { previous_failures: u32 },
    /// Failing tick below (or past) a threshold crossing
    Degraded { consecutive_failures: u32 },
    /// Failing tick that reached the threshold: repair now
    ThresholdCrossed { consecutive_failures: u32 },
}

impl Escalation {
    pub fn requires_repair(self) -> bool {
        matches!(self, Self::ThresholdCrossed { .. })
    }

    /// Events to emit for this tick, in order. `detail` describes the failure.
    pub fn events(self, monitor: MonitorKind, detail: &str) -> Vec<MonitorEvent> {
        match self {
            Self::Steady => Vec::new(),
            Self::Restored { previous_failures } => vec![MonitorEvent::new(
                monitor,
                EventKind::Restored,
                format!("{monitor} restored after {previous_failures} failing checks"),
            )],
            Self::Degraded {
                consecutive_failures,
            } => vec![MonitorEvent::new(
                monitor,
                EventKind::Degraded {
                    consecutive_failures,
                },
                detail,
            )],
            Self::ThresholdCrossed {
                consecutive_failures,
            } => vec![
                MonitorEvent::new(
                    monitor,
                    EventKind::Degraded {
                        consecutive_failures,
                    },
                    detail,
                ),
                MonitorEvent::new(
                    monitor,
                    EventKind::Critical {
                        consecutive_failures,
                    },
                    format!("{monitor} failed {consecutive_failures} consecutive checks, starting repair"),
                ),
            ],
        }
    }
}

/// Per-target escalation state. Mutated only by its monitor's tick.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorState {
    pub consecutive_failures: u32,
    pub threshold: u32,
    pub in_repair: bool,
    /// `None` until the first check completes
    pub phase: Option<MonitorPhase>,
}

impl MonitorState {
    pub fn new(threshold: u32) -> Self {
        Self {
            consecutive_failures: 0,
            threshold: threshold.max(1),
            in_repair: false,
            phase: None,
        }
    }

    pub fn observe(&mut self, failed: bool) -> Escalation {
        if !failed {
            let previous = self.consecutive_failures;
            self.consecutive_failures = 0;
            self.phase = Some(MonitorPhase::Healthy);
            return if previous > 0 {
                Escalation::Restored {
                    previous_failures: previous,
                }
            } else {
                Escalation::Steady
            };
        }

        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let n = self.consecutive_failures;
        if n == self.threshold {
            self.phase = Some(MonitorPhase::Repairing);
            Escalation::ThresholdCrossed {
                consecutive_failures: n,
            }
        } else {
            self.phase = Some(if n > self.threshold {
                MonitorPhase::Critical
            } else {
                MonitorPhase::Degraded
            });
            Escalation::Degraded {
                consecutive_failures: n,
            }
        }
    }

    pub fn begin_repair(&mut self) {
        self.in_repair = true;
        self.phase = Some(MonitorPhase::Repairing);
    }

    pub fn end_repair(&mut self) {
        self.in_repair = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crossings(state: &mut MonitorState, failing_ticks: u32) -> u32 {
        (0..failing_ticks)
            .filter(|_| matches!(state.observe(true), Escalation::ThresholdCrossed { .. }))
            .count() as u32
    }

    #[test]
    fn test_phase_unknown_before_first_check() {
        assert_eq!(MonitorState::new(3).phase, None);
    }

    #[test]
    fn test_repair_requested_once_per_crossing() {
        for n in 3..=9 {
            let mut state = MonitorState::new(3);
            assert_eq!(crossings(&mut state, n), 1, "failing ticks = {n}");
            assert_eq!(state.consecutive_failures, n);
        }
        let mut state = MonitorState::new(3);
        assert_eq!(crossings(&mut state, 2), 0);
    }

    #[test]
    fn test_clean_tick_rearms_crossing() {
        let mut state = MonitorState::new(3);
        assert_eq!(crossings(&mut state, 7), 1);
        state.observe(false);
        assert_eq!(crossings(&mut state, 4), 1);
    }

    #[test]
    fn test_failure_sequence_walks_phases() {
        let mut state = MonitorState::new(3);
        assert_eq!(
            state.observe(true),
            Escalation::Degraded {
                consecutive_failures: 1
            }
        );
        assert_eq!(state.phase, Some(MonitorPhase::Degraded));
        state.observe(true);
        assert_eq!(
            state.observe(true),
            Escalation::ThresholdCrossed {
                consecutive_failures: 3
            }
        );
        assert_eq!(state.phase, Some(MonitorPhase::Repairing));
        state.observe(true);
        assert_eq!(state.phase, Some(MonitorPhase::Critical));
    }

    #[test]
    fn test_clean_tick_resets_and_reports_restored_once() {
        let mut state = MonitorState::new(3);
        state.observe(true);
        state.observe(true);
        assert_eq!(
            state.observe(false),
            Escalation::Restored {
                previous_failures: 2
            }
        );
        assert_eq!(state.consecutive_failures, 0);
        assert_eq!(state.observe(false), Escalation::Steady);
        assert_eq!(state.phase, Some(MonitorPhase::Healthy));
    }

    #[test]
    fn test_repair_does_not_reset_counter() {
        let mut state = MonitorState::new(3);
        crossings(&mut state, 3);
        state.begin_repair();
        state.end_repair();
        assert_eq!(state.consecutive_failures, 3);
        assert!(!state.in_repair);
    }

    #[test]
    fn test_crossing_emits_degraded_then_critical() {
        let events = Escalation::ThresholdCrossed {
            consecutive_failures: 3,
        }
        .events(MonitorKind::Network, "DNS resolution failed");
        let labels: Vec<&str> = events.iter().map(|e| e.kind.label()).collect();
        assert_eq!(labels, vec!["degraded", "critical"]);
        assert_eq!(events[0].message, "DNS resolution failed");
        assert!(Escalation::Steady.events(MonitorKind::Network, "").is_empty());
    }

    #[test]
    fn test_zero_threshold_is_clamped() {
        let mut state = MonitorState::new(0);
        assert!(matches!(state.observe(true), Escalation::ThresholdCrossed { .. }));
    }
}
