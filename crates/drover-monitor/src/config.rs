//! Monitor configuration.

use std::collections::BTreeSet;

use drover_core::BuildId;
use serde::{Deserialize, Serialize};

/// Configuration of the queue monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// When set, only this build is taken from the queue; every other row
    /// is discarded by the scanner.
    pub build_one: Option<BuildId>,
    /// Platforms on which a derivation's `preferLocalBuild` request is
    /// honoured.
    pub local_platforms: BTreeSet<String>,
    /// Machines available to the worker pool.
    pub machines: Vec<MachineConfig>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            build_one: None,
            local_platforms: default_local_platforms(),
            machines: Vec::new(),
        }
    }
}

/// One machine in the capability registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineConfig {
    pub name: String,
    /// Platforms this machine builds for.
    pub systems: BTreeSet<String>,
    #[serde(default)]
    pub supported_features: BTreeSet<String>,
    #[serde(default)]
    pub mandatory_features: BTreeSet<String>,
}

/// The platform this process runs on, plus the pseudo-platform of builtin
/// derivations.
fn default_local_platforms() -> BTreeSet<String> {
    [host_platform(), "builtin".to_owned()].into_iter().collect()
}

fn host_platform() -> String {
    format!("{}-{}", std::env::consts::ARCH, std::env::consts::OS)
}
