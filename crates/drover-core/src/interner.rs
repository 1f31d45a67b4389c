//! Weak interning of steps by derivation path.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::{Build, Step, StorePath};

/// Process-wide map from derivation path to the live step for that path.
///
/// The map holds weak handles only, so a step stays alive exactly as long
/// as some build still owns it; a stale entry is evicted on the next lookup
/// for its path. The interner guarantees at most one live step per
/// derivation path.
#[derive(Debug, Default)]
pub struct StepInterner {
    steps: Mutex<HashMap<StorePath, Weak<Step>>>,
}

impl StepInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the live step for `drv_path`, installing a fresh uninitialised
    /// one if none exists, and link the given back-references to it.
    ///
    /// The returned flag is true when the step was just installed and still
    /// needs initialisation. Interning and back-reference linking happen in
    /// one critical section, so a step can never become reachable from a new
    /// build after the dispatcher has retired it. Lock order: the map lock
    /// first, the step's state lock inside it, both released before the
    /// caller recurses into dependencies.
    pub fn lookup_or_install(
        &self,
        drv_path: &StorePath,
        referring_build: Option<&Arc<Build>>,
        referring_step: Option<&Arc<Step>>,
    ) -> (Arc<Step>, bool) {
        let mut steps = self.steps.lock();

        let mut step = None;
        if let Some(handle) = steps.get(drv_path) {
            step = handle.upgrade();
            if step.is_none() {
                steps.remove(drv_path);
            }
        }

        let is_new = step.is_none();
        let step = step.unwrap_or_else(|| Step::new(drv_path.clone()));

        {
            let mut state = step.lock_state();
            debug_assert!(state.created != is_new);
            if let Some(build) = referring_build {
                state.builds.push(Arc::downgrade(build));
            }
            if let Some(rdep) = referring_step {
                state.rdeps.push(Arc::downgrade(rdep));
            }
        }

        steps.insert(drv_path.clone(), Arc::downgrade(&step));
        (step, is_new)
    }

    /// Drop the entry for a retired step. Called by the dispatcher when a
    /// step finishes; the monitor itself only reads and installs.
    pub fn purge(&self, drv_path: &StorePath) {
        self.steps.lock().remove(drv_path);
    }

    /// Number of entries whose step is still alive.
    pub fn live_count(&self) -> usize {
        self.steps
            .lock()
            .values()
            .filter(|handle| handle.strong_count() > 0)
            .count()
    }
}
