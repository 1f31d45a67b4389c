//! Queue scanning: turning unfinished rows into a working set.

use std::collections::BTreeMap;
use std::sync::Arc;

use drover_core::{Build, BuildId, StorePath};
use tracing::info;

use crate::error::Result;
use crate::state::State;

/// Pending builds keyed by derivation path. Several queued builds may name
/// the same derivation, so each key holds a queue of builds.
#[derive(Debug, Default)]
pub struct WorkingSet {
    pending: BTreeMap<StorePath, Vec<Arc<Build>>>,
    len: usize,
}

impl WorkingSet {
    pub fn insert(&mut self, build: Arc<Build>) {
        self.pending
            .entry(build.drv_path.clone())
            .or_default()
            .push(build);
        self.len += 1;
    }

    /// Pop any pending build (lowest derivation path first).
    pub fn pop(&mut self) -> Option<Arc<Build>> {
        let path = self.pending.keys().next()?.clone();
        self.take(&path)
    }

    /// Remove one pending build for `drv_path`, oldest first, if any.
    pub fn take(&mut self, drv_path: &StorePath) -> Option<Arc<Build>> {
        let builds = self.pending.get_mut(drv_path)?;
        let build = builds.remove(0);
        if builds.is_empty() {
            self.pending.remove(drv_path);
        }
        self.len -= 1;
        Some(build)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Ids still pending, in derivation-path order.
    pub fn ids(&self) -> Vec<BuildId> {
        self.pending
            .values()
            .flat_map(|builds| builds.iter().map(|b| b.id))
            .collect()
    }
}

impl State {
    /// Read all unfinished builds past `high_water` and produce the working
    /// set to ingest. Returns the highest id seen, which becomes the next
    /// high-water mark even when rows below it are filtered out.
    pub async fn scan_queue(&self, high_water: BuildId) -> Result<(BuildId, WorkingSet)> {
        info!(high_water = %high_water, "checking the queue for builds");

        let rows = self.repo.unfinished_builds_after(high_water).await?;

        let mut new_high_water = high_water;
        let mut pending = WorkingSet::default();
        for row in rows {
            new_high_water = new_high_water.max(row.id);
            if self.config.build_one.is_some_and(|pin| pin != row.id) {
                continue;
            }
            if self.builds.lock().contains_key(&row.id) {
                continue;
            }
            let full_job_name = row.full_job_name();
            pending.insert(Build::new(
                row.id,
                row.drv_path,
                full_job_name,
                row.max_silent,
                row.timeout,
            ));
        }

        Ok((new_high_water, pending))
    }
}
