//! The artifact store, as seen by the queue monitor.

use async_trait::async_trait;

use crate::{BuildOutput, Derivation, StoreError, StorePath};

/// Read-only view of the artifact store.
///
/// The monitor needs just enough of the store to expand derivations and to
/// recognise outputs that have already been built; execution and output
/// registration live with the workers.
#[async_trait]
pub trait BuildStore: Send + Sync {
    /// Whether `path` exists and is valid in the store.
    async fn is_valid_path(&self, path: &StorePath) -> Result<bool, StoreError>;

    /// Read and parse the derivation at `path`.
    async fn read_derivation(&self, path: &StorePath) -> Result<Derivation, StoreError>;

    /// Compute the output summary of an already-built derivation.
    async fn build_output(&self, drv: &Derivation) -> Result<BuildOutput, StoreError>;
}
