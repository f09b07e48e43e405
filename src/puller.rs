//! Image pulls with exponential backoff and strategy rotation.
//!
//! Each attempt walks every [`PullVariant`] in order and stops at the first
//! that succeeds. Attempts after the first are preceded by a backoff wait.
//! When the attempt at the midpoint of the budget fails, the network repair
//! pipeline runs once before the remaining attempts.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::background::Sleeper;
use crate::config::PullConfig;
use crate::process::{run_checked, CommandCatalog, Operation, ProcessRunner, PullVariant};
use crate::repair::RepairOrchestrator;

/// Wait before `attempt` (1-based): nothing for the first attempt, then
/// `base * 2^(attempt-2)`, saturating.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    if attempt < 2 {
        return Duration::ZERO;
    }
    let factor = 2u32.checked_pow(attempt - 2).unwrap_or(u32::MAX);
    base.saturating_mul(factor)
}

/// Attempt after whose failure the repair pipeline runs.
pub fn repair_attempt(max_retries: u32) -> u32 {
    (max_retries / 2).max(1)
}

pub struct RetryPuller {
    runner: Arc<dyn ProcessRunner>,
    catalog: CommandCatalog,
    sleeper: Arc<dyn Sleeper>,
    repair: Arc<RepairOrchestrator>,
    config: PullConfig,
    last_error: Mutex<Option<String>>,
}

impl RetryPuller {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        catalog: CommandCatalog,
        sleeper: Arc<dyn Sleeper>,
        repair: Arc<RepairOrchestrator>,
        config: PullConfig,
    ) -> Self {
        Self {
            runner,
            catalog,
            sleeper,
            repair,
            config,
            last_error: Mutex::new(None),
        }
    }

    pub fn default_retries(&self) -> u32 {
        self.config.max_retries
    }

    /// Pull `image`, retrying up to `max_retries` attempts.
    ///
    /// Never errors: exhaustion returns `false` with the last failure kept
    /// in [`last_error`](Self::last_error).
    pub async fn pull_image_with_retry(&self, image: &str, max_retries: u32) -> bool {
        let midpoint = repair_attempt(max_retries);

        for attempt in 1..=max_retries {
            let delay = backoff_delay(self.config.backoff_base(), attempt);
            if !delay.is_zero() {
                info!(image, attempt, delay_secs = delay.as_secs(), "Backing off before pull");
                self.sleeper.sleep(delay).await;
            }

            if let Some(variant) = self.try_variants(image).await {
                info!(image, attempt, variant = variant.label(), "Image pulled");
                *self.last_error.lock().await = None;
                return true;
            }

            if attempt == midpoint && attempt < max_retries {
                warn!(image, attempt, "Pull still failing, running network repair");
                let outcome = self.repair.repair().await;
                if !outcome.succeeded() {
                    warn!(image, "Network repair did not fully succeed");
                }
            }
        }

        if max_retries == 0 {
            *self.last_error.lock().await = Some("no pull attempts allowed".to_string());
        }
        warn!(image, max_retries, "Giving up on image pull");
        false
    }

    pub async fn last_error(&self) -> Option<String> {
        self.last_error.lock().await.clone()
    }

    async fn try_variants(&self, image: &str) -> Option<PullVariant> {
        for variant in PullVariant::ALL {
            let chain = self.catalog.commands(&Operation::PullVariant { image, variant });
            for spec in &chain {
                match run_checked(self.runner.as_ref(), spec, self.config.timeout()).await {
                    Ok(_) => return Some(variant),
                    Err(e) => {
                        warn!(image, variant = variant.label(), error = %e, "Pull variant failed");
                        *self.last_error.lock().await = Some(e.to_string());
                    }
                }
            }
        }
        None
    }
}
