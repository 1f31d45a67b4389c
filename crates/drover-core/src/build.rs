//! Builds: user-visible requests for one derivation's outputs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use crate::{BuildId, Step, StorePath};

/// An intent to produce the outputs of one derivation, tracked with an id
/// and a final status in the database.
///
/// A build is created during ingestion and kept alive by the in-flight
/// builds map; it is dropped when its subgraph completes or when the
/// cancellation reaper evicts it.
#[derive(Debug)]
pub struct Build {
    pub id: BuildId,
    pub drv_path: StorePath,
    /// `project:jobset:job`, for display.
    pub full_job_name: String,
    pub max_silent_time: i32,
    pub build_timeout: i32,
    finished_in_db: AtomicBool,
    toplevel: OnceLock<Arc<Step>>,
}

impl Build {
    pub fn new(
        id: BuildId,
        drv_path: StorePath,
        full_job_name: String,
        max_silent_time: i32,
        build_timeout: i32,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            drv_path,
            full_job_name,
            max_silent_time,
            build_timeout,
            finished_in_db: AtomicBool::new(false),
            toplevel: OnceLock::new(),
        })
    }

    /// Whether a terminal row for this build has been written.
    pub fn finished_in_db(&self) -> bool {
        self.finished_in_db.load(Ordering::Acquire)
    }

    pub fn set_finished_in_db(&self) {
        self.finished_in_db.store(true, Ordering::Release);
    }

    /// Root of the build's step graph. Installed once, after ingestion has
    /// classified the build as runnable; this is the strong reference that
    /// keeps the whole subgraph alive.
    pub fn toplevel(&self) -> Option<&Arc<Step>> {
        self.toplevel.get()
    }

    pub fn set_toplevel(&self, step: Arc<Step>) {
        let _ = self.toplevel.set(step);
    }
}
