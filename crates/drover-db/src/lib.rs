//! PostgreSQL access for the drover queue monitor.
//!
//! Provides the queue repository trait with its Postgres implementation and
//! the notification listener that wakes the monitor loop.

pub mod error;
pub mod listener;
pub mod models;
pub mod queue;

pub use error::{DbError, DbResult};
pub use listener::{QueueEvent, QueueListener};
pub use models::QueuedRow;
pub use queue::{BuildQueueRepo, PgBuildQueueRepo, GC_ERROR_MESSAGE};

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Create a new database connection pool.
pub async fn create_pool(database_url: &str) -> DbResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    Ok(pool)
}
