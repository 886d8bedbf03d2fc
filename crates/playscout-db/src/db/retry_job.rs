use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use playscout_core::models::{MediaId, RetryJob};
use playscout_core::AppError;

/// Persisted schedule of automatic analysis retries.
#[async_trait]
pub trait RetryJobStore: Send + Sync {
    async fn schedule(&self, job: &RetryJob) -> Result<(), AppError>;

    /// Move a job from `scheduled` to `dispatched`. Returns false when another
    /// dispatcher already claimed it or it was cancelled.
    async fn claim(&self, id: Uuid) -> Result<bool, AppError>;

    /// Scheduled jobs whose `run_at` is not after `now`, oldest first.
    async fn due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<RetryJob>, AppError>;

    /// Cancel every still-scheduled job for a media id. Returns how many were cancelled.
    async fn cancel_scheduled(&self, media_id: &MediaId) -> Result<u64, AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<RetryJob>, AppError>;
}

#[derive(Clone)]
pub struct PostgresRetryJobStore {
    pool: PgPool,
}

impl PostgresRetryJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RetryJobStore for PostgresRetryJobStore {
    #[tracing::instrument(skip(self, job), fields(
        db.system = "postgresql",
        db.table = "retry_jobs",
        db.operation = "insert",
        job.id = %job.id,
        media_id = %job.media_id
    ))]
    async fn schedule(&self, job: &RetryJob) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO retry_jobs (id, media_id, attempt, run_at, status, created_at, dispatched_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(job.id)
        .bind(job.media_id.as_str())
        .bind(job.attempt as i32)
        .bind(job.run_at)
        .bind(job.status.to_string())
        .bind(job.created_at)
        .bind(job.dispatched_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.system = "postgresql", db.table = "retry_jobs", db.operation = "update"))]
    async fn claim(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE retry_jobs
            SET status = 'dispatched', dispatched_at = NOW()
            WHERE id = $1 AND status = 'scheduled'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(skip(self), fields(db.system = "postgresql", db.table = "retry_jobs", db.operation = "select"))]
    async fn due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<RetryJob>, AppError> {
        let jobs = sqlx::query_as::<Postgres, RetryJob>(
            r#"
            SELECT id, media_id, attempt, run_at, status, created_at, dispatched_at
            FROM retry_jobs
            WHERE status = 'scheduled' AND run_at <= $1
            ORDER BY run_at ASC
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(jobs)
    }

    #[tracing::instrument(skip(self), fields(db.system = "postgresql", db.table = "retry_jobs", db.operation = "update"))]
    async fn cancel_scheduled(&self, media_id: &MediaId) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE retry_jobs
            SET status = 'cancelled'
            WHERE media_id = $1 AND status = 'scheduled'
            "#,
        )
        .bind(media_id.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn get(&self, id: Uuid) -> Result<Option<RetryJob>, AppError> {
        let job = sqlx::query_as::<Postgres, RetryJob>(
            r#"
            SELECT id, media_id, attempt, run_at, status, created_at, dispatched_at
            FROM retry_jobs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }
}
