//! Build identifiers.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Key of a row in the Builds table.
///
/// Ids are assigned monotonically by the database; the queue monitor uses
/// the highest id it has seen as a high-water mark when scanning for new
/// work.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    sqlx::Type,
)]
#[display("{_0}")]
#[sqlx(transparent)]
pub struct BuildId(i32);

impl BuildId {
    /// Sorts below every real build id; scanning from here sees the whole
    /// queue.
    pub const ZERO: BuildId = BuildId(0);

    pub fn new(id: i32) -> Self {
        Self(id)
    }

    pub fn as_i32(&self) -> i32 {
        self.0
    }
}

impl From<i32> for BuildId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

impl std::str::FromStr for BuildId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}
