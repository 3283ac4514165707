// src/sweeper.rs
// =============================================================================
// The retention sweeper: a background task that deletes old observations.
//
// How it works:
// 1. Runs once right away when started
// 2. Then wakes up every `interval` and prunes everything older than
//    now - retention (30 days by default)
// 3. A failed run is logged and the schedule carries on
// 4. stop() cancels the pending wait; a run already in progress finishes
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{error, info};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::StorageError;
use crate::store::{ObservationStore, PruneReport};

pub struct RetentionSweeper {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl RetentionSweeper {
    // Spawns the sweeper onto the current tokio runtime
    pub fn start<S>(store: Arc<S>, every: Duration, retention: chrono::Duration) -> Self
    where
        S: ObservationStore + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        info!(
            "Starting retention sweeper: every {}h, keeping {} days",
            every.as_secs() / 3600,
            retention.num_days()
        );

        let task = tokio::spawn(async move {
            // The first tick completes immediately, which gives us the
            // startup run for free
            let mut ticker = interval(every.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        // Not raced against the token: a run in progress
                        // always finishes
                        if let Err(e) = run_once(store.as_ref(), retention).await {
                            error!("Retention sweep failed: {}", e);
                        }
                    }
                }
            }
        });

        RetentionSweeper { cancel, task }
    }

    /// Stops the schedule and waits for the task to wind down
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            error!("Retention sweeper task ended abnormally: {}", e);
        }
        info!("Retention sweeper stopped");
    }
}

// One sweep: prune everything strictly older than now - retention
pub async fn run_once<S: ObservationStore>(
    store: &S,
    retention: chrono::Duration,
) -> Result<PruneReport, StorageError> {
    let cutoff = Utc::now() - retention;
    let report = store.prune(cutoff).await?;

    info!(
        "Pruned records older than {}: removed {} observations and {} batches, kept {} and {}",
        cutoff.to_rfc3339(),
        report.observations_removed,
        report.batches_removed,
        report.observations_kept,
        report.batches_kept
    );
    Ok(report)
}
