//! Store paths.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Content-addressed path of a derivation or output in the artifact store.
#[derive(
    Debug,
    Clone,
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
pub struct StorePath(String);

impl StorePath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for StorePath {
    fn from(path: String) -> Self {
        Self(path)
    }
}

impl From<&str> for StorePath {
    fn from(path: &str) -> Self {
        Self(path.to_owned())
    }
}

impl AsRef<str> for StorePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
