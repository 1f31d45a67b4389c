//! Core domain types for the drover build coordinator.
//!
//! This crate contains:
//! - Build and store-path identifiers
//! - Derivations, build outputs, and terminal status codes
//! - The shared build/step graph and its weak interner
//! - The store and dispatcher traits implemented by external collaborators

pub mod build;
pub mod dispatch;
pub mod drv;
pub mod error;
pub mod id;
pub mod interner;
pub mod path;
pub mod status;
pub mod step;
pub mod store;

pub use build::Build;
pub use dispatch::Dispatcher;
pub use drv::{BuildOutput, Derivation, DerivationOutput};
pub use error::StoreError;
pub use id::BuildId;
pub use interner::StepInterner;
pub use path::StorePath;
pub use status::{BuildStatus, StepStatus};
pub use step::{Step, StepInit, StepState};
pub use store::BuildStore;
