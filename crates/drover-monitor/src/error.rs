//! Monitor error types.

use drover_core::{BuildId, StoreError};
use drover_db::DbError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("database error: {0}")]
    Db(#[from] DbError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("while loading build {build}: {source}")]
    Ingest {
        build: BuildId,
        source: Box<MonitorError>,
    },
}

pub type Result<T> = std::result::Result<T, MonitorError>;
