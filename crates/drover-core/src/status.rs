//! Terminal status codes.

use serde::{Deserialize, Serialize};

/// Final status of a build. The integer codes are part of the database
/// schema and must not be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum BuildStatus {
    Success = 0,
    Failed = 1,
    /// A dependency of the requested derivation failed.
    DepFailed = 2,
    Aborted = 3,
    /// No registered machine can execute the step.
    Unsupported = 4,
}

impl BuildStatus {
    /// The integer code written to the database.
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Final status of a single build step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum StepStatus {
    Success = 0,
    Failed = 1,
    Unsupported = 2,
}

impl StepStatus {
    pub fn code(self) -> i32 {
        self as i32
    }
}
