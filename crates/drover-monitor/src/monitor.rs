//! The queue monitor loop.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use drover_core::BuildId;
use drover_db::{QueueEvent, QueueListener};
use sqlx::PgPool;
use tokio::time::sleep;
use tracing::{debug, error};

use crate::error::Result;
use crate::state::State;

/// Back-off after a failure before reconnecting; most failures here are
/// database trouble, so don't retry right away.
const RETRY_DELAY: Duration = Duration::from_secs(10);

/// Drives the queue: scans for new builds, ingests them, and reconciles
/// cancellations, sleeping on database notifications in between.
pub struct QueueMonitor {
    state: Arc<State>,
    pool: PgPool,
}

impl QueueMonitor {
    pub fn new(state: Arc<State>, pool: PgPool) -> Self {
        Self { state, pool }
    }

    /// Run forever. Any error restarts the inner loop from scratch after a
    /// short back-off, re-opening the listening connection; the in-memory
    /// build set is preserved across restarts.
    pub async fn run(&self) {
        loop {
            if let Err(e) = self.monitor_loop().await {
                error!(error = %e, "queue monitor restarting");
                sleep(RETRY_DELAY).await;
            }
        }
    }

    async fn monitor_loop(&self) -> Result<()> {
        let mut listener = QueueListener::connect(&self.pool).await?;
        let mut last_build_id = BuildId::ZERO;

        loop {
            let (high_water, mut pending) = self.state.scan_queue(last_build_id).await?;
            last_build_id = high_water;
            self.state.ingest_pending(&mut pending).await?;

            let events = listener.wait_for_event().await?;
            self.state.nr_queue_wakeups.fetch_add(1, Ordering::Relaxed);

            if events.contains(&QueueEvent::BuildsAdded) {
                debug!("got notification: new builds added to the queue");
            }
            if events.contains(&QueueEvent::BuildsRestarted) {
                debug!("got notification: builds restarted");
                last_build_id = BuildId::ZERO;
            }
            if events.contains(&QueueEvent::BuildsCancelled)
                || events.contains(&QueueEvent::BuildsDeleted)
            {
                debug!("got notification: builds cancelled");
                self.state.remove_cancelled_builds().await?;
            }
        }
    }
}
