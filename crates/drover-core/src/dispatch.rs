//! Hand-off point to the worker pool.

use std::sync::Arc;

use crate::Step;

/// Sink for steps that have become runnable.
///
/// Implemented by the worker dispatcher. A step is handed over only after
/// `created` is true and its dependency set is empty. Implementations are
/// expected to keep a weak handle on the queued step: a step whose owning
/// build was discarded before a worker claimed it simply expires.
pub trait Dispatcher: Send + Sync {
    fn make_runnable(&self, step: Arc<Step>);
}
