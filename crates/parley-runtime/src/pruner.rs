//! Periodic session cache sweep.

use std::sync::Arc;
use std::time::Duration;

use parley_sessions::SessionCache;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Longest sweep period; larger intervals are clamped to it.
pub const MAX_PRUNE_INTERVAL: Duration = Duration::from_secs(365 * 24 * 3600);

/// Spawn a task that prunes expired sessions every `interval` until
/// `cancel` fires. The first sweep happens one interval after start.
pub fn spawn_prune_task(
    cache: Arc<SessionCache>,
    interval: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let interval = interval.min(MAX_PRUNE_INTERVAL);
    tokio::spawn(async move {
        let start = Instant::now()
            .checked_add(interval)
            .unwrap_or_else(Instant::now);
        let mut ticker = tokio::time::interval_at(start, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("prune task stopped");
                    return;
                }
                _ = ticker.tick() => {}
            }

            match cache.prune() {
                Ok(0) => {}
                Ok(removed) => info!(removed, "pruned expired sessions"),
                Err(e) => warn!(error = %e, "session prune failed"),
            }
        }
    })
}
