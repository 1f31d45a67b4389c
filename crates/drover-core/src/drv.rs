//! Derivations and build outputs as exposed by the artifact store.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::StorePath;

/// One declared output of a derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivationOutput {
    pub path: StorePath,
}

/// A build recipe read from the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Derivation {
    /// Declared outputs by name.
    pub outputs: BTreeMap<String, DerivationOutput>,
    /// Input derivations and the output names consumed from each.
    pub input_drvs: BTreeMap<StorePath, BTreeSet<String>>,
    /// Platform the derivation must be built on.
    pub platform: String,
    /// Builder environment.
    pub env: BTreeMap<String, String>,
}

impl Derivation {
    /// Paths of all declared outputs.
    pub fn output_paths(&self) -> impl Iterator<Item = &StorePath> {
        self.outputs.values().map(|o| &o.path)
    }
}

/// Summary of a finished build's outputs, computed by the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildOutput {
    pub release_name: Option<String>,
    pub closure_size: i64,
}
