//! Cancellation reconciliation.

use tracing::info;

use crate::error::Result;
use crate::state::State;

impl State {
    /// Drop in-memory builds that are no longer unfinished in the database
    /// (cancelled or deleted).
    ///
    /// Active steps of a dropped build are not interrupted; they terminate
    /// naturally and the dispatcher discards their results.
    pub async fn remove_cancelled_builds(&self) -> Result<()> {
        let current = self.repo.unfinished_build_ids().await?;

        let mut builds = self.builds.lock();
        builds.retain(|id, _| {
            if current.contains(id) {
                true
            } else {
                info!(build_id = %id, "discarding cancelled build");
                false
            }
        });
        Ok(())
    }
}
