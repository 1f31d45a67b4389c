//! Shared state of the queue monitor.
//!
//! Lock discipline: the builds map, the step interner, and the machines map
//! are never held at the same time. A per-step state lock is only acquired
//! after the interner lock and is released before any I/O. The machines
//! lock is a leaf.

use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use drover_core::{Build, BuildId, BuildStore, Dispatcher, Step, StepInterner};
use drover_db::BuildQueueRepo;
use parking_lot::{Mutex, RwLock};

use crate::config::MonitorConfig;
use crate::machines::Machine;

/// Everything the monitor loop shares with the worker pool.
pub struct State {
    pub config: MonitorConfig,
    pub repo: Arc<dyn BuildQueueRepo>,
    pub store: Arc<dyn BuildStore>,
    pub dispatcher: Arc<dyn Dispatcher>,

    /// Builds currently in flight, keyed by id. An entry here holds, via
    /// the build's toplevel step, the strong reference that keeps the
    /// build's subgraph alive.
    pub builds: Mutex<HashMap<BuildId, Arc<Build>>>,
    /// At most one live step per derivation path.
    pub steps: StepInterner,
    /// Machine capability registry, read-mostly.
    pub machines: RwLock<HashMap<String, Arc<Machine>>>,

    /// Builds taken from the queue since startup.
    pub nr_builds_read: AtomicU64,
    /// Builds written terminally by this monitor since startup.
    pub nr_builds_done: AtomicU64,
    /// Times the monitor woke on a notification.
    pub nr_queue_wakeups: AtomicU64,
}

impl State {
    pub fn new(
        config: MonitorConfig,
        repo: Arc<dyn BuildQueueRepo>,
        store: Arc<dyn BuildStore>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Arc<Self> {
        let machines = config
            .machines
            .iter()
            .cloned()
            .map(|m| (m.name.clone(), Arc::new(Machine::from_config(m))))
            .collect();
        Arc::new(Self {
            config,
            repo,
            store,
            dispatcher,
            builds: Mutex::new(HashMap::new()),
            steps: StepInterner::new(),
            machines: RwLock::new(machines),
            nr_builds_read: AtomicU64::new(0),
            nr_builds_done: AtomicU64::new(0),
            nr_queue_wakeups: AtomicU64::new(0),
        })
    }

    /// Whether any registered machine can execute `step`.
    pub fn step_supported(&self, step: &Step) -> bool {
        self.machines.read().values().any(|m| m.supports_step(step))
    }
}
