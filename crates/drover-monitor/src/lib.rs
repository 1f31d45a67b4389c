//! Queue monitoring for the drover build coordinator.
//!
//! Watches the Builds table for newly queued builds, expands each into the
//! shared step graph, deduplicates steps already known or already built,
//! classifies builds that cannot run (derivation garbage-collected, cached
//! failure, unsupported platform), and hands runnable steps to the worker
//! dispatcher. Cancelled and deleted builds are reconciled against the
//! database on notification.

pub mod config;
pub mod error;
pub mod graph;
pub mod ingest;
pub mod machines;
pub mod monitor;
pub mod reaper;
pub mod scan;
pub mod state;

#[cfg(test)]
mod testutil;

pub use config::{MachineConfig, MonitorConfig};
pub use error::{MonitorError, Result};
pub use machines::Machine;
pub use monitor::QueueMonitor;
pub use scan::WorkingSet;
pub use state::State;
