//! Build ingestion: expanding queued builds into the step graph and
//! classifying the ones that cannot or need not run.

use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::Utc;
use drover_core::{Build, BuildStatus, Step, StepStatus, StorePath};
use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, error, info};

use crate::error::{MonitorError, Result};
use crate::scan::WorkingSet;
use crate::state::State;

impl State {
    /// Ingest every build in the working set, handing new runnable steps to
    /// the dispatcher as each build completes. Workers may start on them
    /// while later builds are still being ingested.
    pub async fn ingest_pending(&self, pending: &mut WorkingSet) -> Result<()> {
        while let Some(build) = pending.pop() {
            let build_id = build.id;
            let mut new_runnable = HashSet::new();
            let mut nr_added = 0u64;

            self.ingest(build, pending, &mut new_runnable, &mut nr_added)
                .await
                .map_err(|source| MonitorError::Ingest {
                    build: build_id,
                    source: Box::new(source),
                })?;

            debug!(
                nr_runnable = new_runnable.len(),
                nr_added, "got new runnable steps"
            );
            for step in new_runnable {
                self.dispatcher.make_runnable(step);
            }
            self.nr_builds_read.fetch_add(nr_added, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Ingest one build. Re-entrant: expanding this build may reveal steps
    /// that are the top level of other queued builds, and those are drained
    /// from the working set and ingested first, so that every step is
    /// accounted to the build that owns its derivation.
    fn ingest<'a>(
        &'a self,
        build: Arc<Build>,
        pending: &'a mut WorkingSet,
        new_runnable: &'a mut HashSet<Arc<Step>>,
        nr_added: &'a mut u64,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            debug!(build_id = %build.id, job = %build.full_job_name, "loading build");
            *nr_added += 1;

            // The derivation itself may have been GC'ed while the build sat
            // in the queue.
            if !self.store.is_valid_path(&build.drv_path).await? {
                error!(build_id = %build.id, "aborting GC'ed build");
                if !build.finished_in_db() {
                    self.repo
                        .mark_build_aborted_gc(build.id, Utc::now().timestamp())
                        .await?;
                    build.set_finished_in_db();
                    self.nr_builds_done.fetch_add(1, Ordering::Relaxed);
                }
                return Ok(());
            }

            let mut finished_drvs = HashSet::new();
            let mut new_steps = HashSet::new();
            let root = self
                .create_step(
                    &build.drv_path,
                    Some(&build),
                    None,
                    &mut finished_drvs,
                    &mut new_steps,
                    new_runnable,
                )
                .await?;

            // Some of the new steps may be the top level of builds still in
            // the working set. Ingest those now.
            for step in &new_steps {
                while let Some(other) = pending.take(step.drv_path()) {
                    self.ingest(other, pending, new_runnable, nr_added).await?;
                }
            }

            // No root step: every output is valid already, so this is a
            // cached success.
            let Some(root) = root else {
                let drv = self.store.read_derivation(&build.drv_path).await?;
                let output = self.store.build_output(&drv).await?;
                self.repo
                    .mark_build_cached_success(build.id, &output, Utc::now().timestamp())
                    .await?;
                build.set_finished_in_db();
                return Ok(());
            };

            // Fail the build up front if any of its new steps has a cached
            // failure or no machine that can run it.
            for step in &new_steps {
                let mut build_status = BuildStatus::Success;
                let mut step_status = StepStatus::Failed;

                let outputs = step_output_paths(step);
                if self.repo.has_cached_failure(&outputs).await? {
                    error!(build_id = %build.id, drv_path = %step.drv_path(), "marking build as cached failure");
                    build_status = if Arc::ptr_eq(step, &root) {
                        BuildStatus::Failed
                    } else {
                        BuildStatus::DepFailed
                    };
                    step_status = StepStatus::Failed;
                }

                if build_status == BuildStatus::Success && !self.step_supported(step) {
                    error!(build_id = %build.id, drv_path = %step.drv_path(), "aborting unsupported build");
                    build_status = BuildStatus::Unsupported;
                    step_status = StepStatus::Unsupported;
                }

                if build_status != BuildStatus::Success {
                    if !build.finished_in_db() {
                        self.repo
                            .mark_build_failed(
                                build.id,
                                build_status,
                                step_status,
                                step.drv_path(),
                                Utc::now().timestamp(),
                            )
                            .await?;
                        build.set_finished_in_db();
                        self.nr_builds_done.fetch_add(1, Ordering::Relaxed);
                    }
                    // The build and every new step not reachable from some
                    // published build die with this frame; the dispatcher's
                    // weak handles to them expire.
                    return Ok(());
                }
            }

            // Publish. The strong reference installed here is what keeps
            // the whole subgraph alive from now on.
            {
                let mut builds = self.builds.lock();
                if !build.finished_in_db() {
                    builds.insert(build.id, build.clone());
                }
                build.set_toplevel(root.clone());
            }

            info!(
                build_id = %build.id,
                toplevel = %root.drv_path(),
                nr_steps = new_steps.len(),
                "added build"
            );
            Ok(())
        }
        .boxed()
    }
}

fn step_output_paths(step: &Step) -> Vec<StorePath> {
    step.init()
        .map(|init| init.drv.output_paths().cloned().collect())
        .unwrap_or_default()
}
