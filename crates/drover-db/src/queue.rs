//! Queue access: the scan, the terminal update shapes, and the
//! cached-failure oracle.

use std::collections::HashSet;

use async_trait::async_trait;
use drover_core::{BuildId, BuildOutput, BuildStatus, StepStatus, StorePath};
use sqlx::PgPool;

use crate::models::QueuedRow;
use crate::DbResult;

/// Error message written for a build whose derivation disappeared from the
/// store before it could run.
pub const GC_ERROR_MESSAGE: &str = "derivation was garbage-collected prior to build";

/// Database operations of the queue monitor.
///
/// Every terminal update carries a `finished = 0` guard, so a build that
/// was completed or cancelled elsewhere between scan and update is never
/// clobbered.
#[async_trait]
pub trait BuildQueueRepo: Send + Sync {
    /// All unfinished builds with `id > high_water`, in id order, read in
    /// one short transaction.
    async fn unfinished_builds_after(&self, high_water: BuildId) -> DbResult<Vec<QueuedRow>>;

    /// Ids of all unfinished builds, for cancellation reconciliation.
    async fn unfinished_build_ids(&self) -> DbResult<HashSet<BuildId>>;

    /// Terminally abort a build whose derivation was garbage-collected.
    async fn mark_build_aborted_gc(&self, id: BuildId, now: i64) -> DbResult<()>;

    /// Terminally succeed a build whose outputs were all valid already.
    async fn mark_build_cached_success(
        &self,
        id: BuildId,
        output: &BuildOutput,
        now: i64,
    ) -> DbResult<()>;

    /// Terminally fail a build during classification, recording the failing
    /// step in the same transaction.
    async fn mark_build_failed(
        &self,
        id: BuildId,
        build_status: BuildStatus,
        step_status: StepStatus,
        step_drv: &StorePath,
        now: i64,
    ) -> DbResult<()>;

    /// Whether any of `outputs` is a known-failed path.
    async fn has_cached_failure(&self, outputs: &[StorePath]) -> DbResult<bool>;
}

/// PostgreSQL implementation of [`BuildQueueRepo`].
pub struct PgBuildQueueRepo {
    pool: PgPool,
}

impl PgBuildQueueRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BuildQueueRepo for PgBuildQueueRepo {
    async fn unfinished_builds_after(&self, high_water: BuildId) -> DbResult<Vec<QueuedRow>> {
        let mut txn = self.pool.begin().await?;
        let rows = sqlx::query_as::<_, QueuedRow>(
            r#"
            SELECT id, project, jobset, job, drvPath, maxsilent, timeout
            FROM Builds
            WHERE id > $1 AND finished = 0
            ORDER BY id
            "#,
        )
        .bind(high_water)
        .fetch_all(&mut *txn)
        .await?;
        txn.commit().await?;
        Ok(rows)
    }

    async fn unfinished_build_ids(&self) -> DbResult<HashSet<BuildId>> {
        let ids: Vec<BuildId> =
            sqlx::query_scalar("SELECT id FROM Builds WHERE finished = 0")
                .fetch_all(&self.pool)
                .await?;
        Ok(ids.into_iter().collect())
    }

    async fn mark_build_aborted_gc(&self, id: BuildId, now: i64) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE Builds
            SET finished = 1, busy = 0, buildStatus = $2,
                startTime = $3, stopTime = $3, errorMsg = $4
            WHERE id = $1 AND finished = 0
            "#,
        )
        .bind(id)
        .bind(BuildStatus::Aborted.code())
        .bind(now)
        .bind(GC_ERROR_MESSAGE)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_build_cached_success(
        &self,
        id: BuildId,
        output: &BuildOutput,
        now: i64,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE Builds
            SET finished = 1, busy = 0, buildStatus = $2,
                startTime = $3, stopTime = $3, isCachedBuild = 1,
                releaseName = $4, closureSize = $5
            WHERE id = $1 AND finished = 0
            "#,
        )
        .bind(id)
        .bind(BuildStatus::Success.code())
        .bind(now)
        .bind(output.release_name.as_deref())
        .bind(output.closure_size)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_build_failed(
        &self,
        id: BuildId,
        build_status: BuildStatus,
        step_status: StepStatus,
        step_drv: &StorePath,
        now: i64,
    ) -> DbResult<()> {
        let is_cached = i32::from(build_status != BuildStatus::Unsupported);
        let mut txn = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO BuildSteps (build, stepnr, type, drvPath, busy, status)
            VALUES ($1, 1, 0, $2, 0, $3)
            "#,
        )
        .bind(id)
        .bind(step_drv)
        .bind(step_status.code())
        .execute(&mut *txn)
        .await?;
        sqlx::query(
            r#"
            UPDATE Builds
            SET finished = 1, busy = 0, buildStatus = $2,
                startTime = $3, stopTime = $3, isCachedBuild = $4
            WHERE id = $1 AND finished = 0
            "#,
        )
        .bind(id)
        .bind(build_status.code())
        .bind(now)
        .bind(is_cached)
        .execute(&mut *txn)
        .await?;
        txn.commit().await?;
        Ok(())
    }

    async fn has_cached_failure(&self, outputs: &[StorePath]) -> DbResult<bool> {
        let paths: Vec<String> = outputs.iter().map(|p| p.as_str().to_owned()).collect();
        let found: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM FailedPaths WHERE path = ANY($1))",
        )
        .bind(&paths)
        .fetch_one(&self.pool)
        .await?;
        Ok(found)
    }
}
