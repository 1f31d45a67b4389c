//! In-memory fakes for the store, queue repository, and dispatcher seams.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use drover_core::{
    BuildId, BuildOutput, BuildStatus, BuildStore, Derivation, DerivationOutput, Dispatcher,
    Step, StepStatus, StoreError, StorePath,
};
use drover_db::{BuildQueueRepo, DbResult, QueuedRow, GC_ERROR_MESSAGE};
use parking_lot::Mutex;

use crate::config::MonitorConfig;
use crate::state::State;

/// A derivation with one output named `out` and the given input
/// derivations, on `x86_64-linux`.
pub fn drv(output: &str, inputs: &[&str]) -> Derivation {
    Derivation {
        outputs: [(
            "out".to_owned(),
            DerivationOutput {
                path: StorePath::from(output),
            },
        )]
        .into(),
        input_drvs: inputs
            .iter()
            .map(|path| (StorePath::from(*path), Default::default()))
            .collect(),
        platform: "x86_64-linux".to_owned(),
        env: Default::default(),
    }
}

pub fn queued_row(id: i32, drv_path: &str) -> QueuedRow {
    QueuedRow {
        id: BuildId::new(id),
        project: "proj".into(),
        jobset: "main".into(),
        job: format!("job-{id}"),
        drv_path: StorePath::from(drv_path),
        max_silent: 3600,
        timeout: 7200,
    }
}

/// Store fake: a derivation's path is valid iff the derivation is
/// registered; output paths are valid only when marked so.
#[derive(Default)]
pub struct MemoryStore {
    drvs: Mutex<HashMap<StorePath, Derivation>>,
    valid: Mutex<HashSet<StorePath>>,
    reads: Mutex<Vec<StorePath>>,
}

impl MemoryStore {
    pub fn add_derivation(&self, path: &str, drv: Derivation) {
        let path = StorePath::from(path);
        self.valid.lock().insert(path.clone());
        self.drvs.lock().insert(path, drv);
    }

    pub fn mark_valid(&self, path: &str) {
        self.valid.lock().insert(StorePath::from(path));
    }

    pub fn derivation_reads(&self, path: &str) -> usize {
        let path = StorePath::from(path);
        self.reads.lock().iter().filter(|p| **p == path).count()
    }
}

#[async_trait]
impl BuildStore for MemoryStore {
    async fn is_valid_path(&self, path: &StorePath) -> Result<bool, StoreError> {
        Ok(self.valid.lock().contains(path))
    }

    async fn read_derivation(&self, path: &StorePath) -> Result<Derivation, StoreError> {
        self.reads.lock().push(path.clone());
        self.drvs
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::BadDerivation {
                path: path.clone(),
                message: "no such derivation".to_owned(),
            })
    }

    async fn build_output(&self, _drv: &Derivation) -> Result<BuildOutput, StoreError> {
        Ok(BuildOutput::default())
    }
}

/// One terminal write recorded by the repo fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalUpdate {
    AbortedGc {
        id: BuildId,
        error_msg: String,
    },
    CachedSuccess {
        id: BuildId,
    },
    Failed {
        id: BuildId,
        build_status: BuildStatus,
        step_status: StepStatus,
        step_drv: StorePath,
        is_cached: bool,
    },
}

/// Queue repository fake. Rows are unfinished builds; a terminal update
/// removes the row, mirroring the `finished = 0` guard.
#[derive(Default)]
pub struct MemoryQueueRepo {
    rows: Mutex<Vec<QueuedRow>>,
    updates: Mutex<Vec<TerminalUpdate>>,
    failed_paths: Mutex<HashSet<StorePath>>,
}

impl MemoryQueueRepo {
    pub fn push_row(&self, row: QueuedRow) {
        self.rows.lock().push(row);
    }

    pub fn mark_failed_path(&self, path: &str) {
        self.failed_paths.lock().insert(StorePath::from(path));
    }

    pub fn updates(&self) -> Vec<TerminalUpdate> {
        self.updates.lock().clone()
    }

    fn finish(&self, id: BuildId, update: TerminalUpdate) {
        let mut rows = self.rows.lock();
        if rows.iter().any(|row| row.id == id) {
            rows.retain(|row| row.id != id);
            self.updates.lock().push(update);
        }
    }
}

#[async_trait]
impl BuildQueueRepo for MemoryQueueRepo {
    async fn unfinished_builds_after(&self, high_water: BuildId) -> DbResult<Vec<QueuedRow>> {
        let mut rows: Vec<QueuedRow> = self
            .rows
            .lock()
            .iter()
            .filter(|row| row.id > high_water)
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.id);
        Ok(rows)
    }

    async fn unfinished_build_ids(&self) -> DbResult<HashSet<BuildId>> {
        Ok(self.rows.lock().iter().map(|row| row.id).collect())
    }

    async fn mark_build_aborted_gc(&self, id: BuildId, _now: i64) -> DbResult<()> {
        self.finish(
            id,
            TerminalUpdate::AbortedGc {
                id,
                error_msg: GC_ERROR_MESSAGE.to_owned(),
            },
        );
        Ok(())
    }

    async fn mark_build_cached_success(
        &self,
        id: BuildId,
        _output: &BuildOutput,
        _now: i64,
    ) -> DbResult<()> {
        self.finish(id, TerminalUpdate::CachedSuccess { id });
        Ok(())
    }

    async fn mark_build_failed(
        &self,
        id: BuildId,
        build_status: BuildStatus,
        step_status: StepStatus,
        step_drv: &StorePath,
        _now: i64,
    ) -> DbResult<()> {
        self.finish(
            id,
            TerminalUpdate::Failed {
                id,
                build_status,
                step_status,
                step_drv: step_drv.clone(),
                is_cached: build_status != BuildStatus::Unsupported,
            },
        );
        Ok(())
    }

    async fn has_cached_failure(&self, outputs: &[StorePath]) -> DbResult<bool> {
        let failed = self.failed_paths.lock();
        Ok(outputs.iter().any(|path| failed.contains(path)))
    }
}

/// Dispatcher fake holding weak handles, like the real runnable queue.
#[derive(Default)]
pub struct RecordingDispatcher {
    runnable: Mutex<Vec<(StorePath, Weak<Step>)>>,
}

impl RecordingDispatcher {
    /// Paths of every step ever handed over.
    pub fn dispatched_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .runnable
            .lock()
            .iter()
            .map(|(path, _)| path.as_str().to_owned())
            .collect();
        paths.sort();
        paths
    }

    /// Paths of handed-over steps that are still alive.
    pub fn live_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .runnable
            .lock()
            .iter()
            .filter(|(_, step)| step.strong_count() > 0)
            .map(|(path, _)| path.as_str().to_owned())
            .collect();
        paths.sort();
        paths
    }
}

impl Dispatcher for RecordingDispatcher {
    fn make_runnable(&self, step: Arc<Step>) {
        self.runnable
            .lock()
            .push((step.drv_path().clone(), Arc::downgrade(&step)));
    }
}

pub struct Harness {
    pub state: Arc<State>,
    pub store: Arc<MemoryStore>,
    pub repo: Arc<MemoryQueueRepo>,
    pub dispatcher: Arc<RecordingDispatcher>,
}

pub fn harness(config: MonitorConfig) -> Harness {
    let store = Arc::new(MemoryStore::default());
    let repo = Arc::new(MemoryQueueRepo::default());
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let state = State::new(config, repo.clone(), store.clone(), dispatcher.clone());
    Harness {
        state,
        store,
        repo,
        dispatcher,
    }
}
