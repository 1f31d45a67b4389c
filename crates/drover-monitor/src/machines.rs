//! Machine capability registry.

use std::collections::BTreeSet;

use drover_core::Step;

use crate::config::MachineConfig;

/// A build machine known to the coordinator.
#[derive(Debug, Clone)]
pub struct Machine {
    pub name: String,
    /// Platforms this machine builds for.
    pub systems: BTreeSet<String>,
    pub supported_features: BTreeSet<String>,
    /// Features a step must request for this machine to accept it at all.
    pub mandatory_features: BTreeSet<String>,
}

impl Machine {
    pub fn from_config(config: MachineConfig) -> Self {
        Self {
            name: config.name,
            systems: config.systems,
            supported_features: config.supported_features,
            mandatory_features: config.mandatory_features,
        }
    }

    /// Whether this machine can execute `step`: the step's platform is one
    /// of the machine's systems, every requested feature is available, and
    /// every mandatory feature was requested. A step that has not been
    /// initialised yet is never supported.
    pub fn supports_step(&self, step: &Step) -> bool {
        let Some(init) = step.init() else {
            return false;
        };
        self.systems.contains(&init.drv.platform)
            && init.required_system_features.iter().all(|feature| {
                self.supported_features.contains(feature)
                    || self.mandatory_features.contains(feature)
            })
            && self
                .mandatory_features
                .iter()
                .all(|feature| init.required_system_features.contains(feature))
    }
}
