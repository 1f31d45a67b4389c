//! Store errors.

use thiserror::Error;

use crate::StorePath;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("path is not valid in the store: {0}")]
    InvalidPath(StorePath),

    #[error("unreadable derivation {path}: {message}")]
    BadDerivation { path: StorePath, message: String },

    #[error("store i/o error: {0}")]
    Io(#[from] std::io::Error),
}
