//! Steps: nodes of the shared execution DAG.

use std::collections::{BTreeSet, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::{Mutex, MutexGuard};

use crate::{Build, Derivation, StorePath};

/// Once-written initialisation block of a step, filled in by the graph
/// builder after the derivation has been read and before `created` is set.
#[derive(Debug)]
pub struct StepInit {
    pub drv: Derivation,
    /// Whitespace-tokenised `requiredSystemFeatures` from the derivation
    /// environment.
    pub required_system_features: BTreeSet<String>,
    /// The derivation asked for a local build and its platform is in the
    /// configured local-platform set.
    pub prefer_local_build: bool,
}

/// Mutable state of a step, guarded by the step's own lock.
#[derive(Debug, Default)]
pub struct StepState {
    /// Steps this step still depends on. These are strong references: the
    /// DAG owns its dependencies.
    pub deps: HashSet<Arc<Step>>,
    /// Steps that depend on this step.
    pub rdeps: Vec<Weak<Step>>,
    /// Builds that want this step's outputs.
    pub builds: Vec<Weak<Build>>,
    /// True once initialisation is complete. Until then no other actor may
    /// treat the step as runnable.
    pub created: bool,
}

/// A node in the execution DAG for one derivation that still needs to run.
///
/// At most one live step exists per derivation path (the interner enforces
/// this), so two builds whose graphs overlap share the overlapping steps.
/// A step stays alive exactly as long as some build reaches it through
/// `toplevel → deps*`; everything else refers to it weakly.
#[derive(Debug)]
pub struct Step {
    drv_path: StorePath,
    init: OnceLock<StepInit>,
    state: Mutex<StepState>,
}

impl Step {
    pub fn new(drv_path: StorePath) -> Arc<Self> {
        Arc::new(Self {
            drv_path,
            init: OnceLock::new(),
            state: Mutex::new(StepState::default()),
        })
    }

    /// The derivation path, which is the step's identity.
    pub fn drv_path(&self) -> &StorePath {
        &self.drv_path
    }

    /// Install the initialisation block. Called exactly once, by the graph
    /// builder, before the step is marked created.
    pub fn set_init(&self, init: StepInit) {
        let reinitialised = self.init.set(init).is_err();
        debug_assert!(!reinitialised, "step initialised twice");
    }

    /// The initialisation block, if the step has been initialised.
    pub fn init(&self) -> Option<&StepInit> {
        self.init.get()
    }

    pub fn lock_state(&self) -> MutexGuard<'_, StepState> {
        self.state.lock()
    }

    /// Whether the step may be handed to a worker: initialisation complete
    /// and no remaining dependencies.
    pub fn runnable(&self) -> bool {
        let state = self.state.lock();
        state.created && state.deps.is_empty()
    }
}

impl PartialEq for Step {
    fn eq(&self, other: &Self) -> bool {
        self.drv_path == other.drv_path
    }
}

impl Eq for Step {}

impl Hash for Step {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.drv_path.hash(state);
    }
}
