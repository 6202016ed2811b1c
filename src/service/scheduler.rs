//! Fixed-interval trigger for the audit cycle.
//!
//! The trigger only says "run now"; single-flight protection lives in
//! [`RelayService::run_cycle`], so a tick firing during a slow cycle is
//! skipped there rather than queued here.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::relay_service::{CycleOutcome, RelayService};

/// Spawns the periodic audit loop.
///
/// Missed ticks are skipped, not bursted: the cycle must not assume it
/// runs exactly once per interval.
pub fn spawn_audit_loop(service: Arc<RelayService>, interval_secs: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match service.run_cycle().await {
                Ok(CycleOutcome::Completed {
                    audited,
                    unreconciled,
                }) => {
                    tracing::debug!(audited, unreconciled, "audit cycle completed");
                }
                Ok(CycleOutcome::Idle | CycleOutcome::Skipped) => {}
                Err(error) => {
                    // The cycle left no partial state; the next tick
                    // retries the same selection.
                    tracing::error!(%error, "audit cycle failed");
                }
            }
        }
    })
}
