//! Row types read from the queue.

use drover_core::{BuildId, StorePath};

/// One unfinished row of the Builds table, as returned by the queue scan.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QueuedRow {
    pub id: BuildId,
    pub project: String,
    pub jobset: String,
    pub job: String,
    #[sqlx(rename = "drvpath")]
    pub drv_path: StorePath,
    #[sqlx(rename = "maxsilent")]
    pub max_silent: i32,
    pub timeout: i32,
}

impl QueuedRow {
    /// `project:jobset:job`, the display name of the build.
    pub fn full_job_name(&self) -> String {
        format!("{}:{}:{}", self.project, self.jobset, self.job)
    }
}
