use chrono::{DateTime, Utc};
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

use archivist_core::error::AppError;
use archivist_core::models::ArchiveRequest;
use archivist_core::task::{ArchiveTask, RetryConfig, TaskStatus};
use archivist_core::task_queue::TaskQueue;

/// PostgreSQL-backed archive task queue using `SELECT FOR UPDATE SKIP LOCKED`.
#[derive(Clone)]
pub struct ArchiveTaskRepository {
    pool: Pool<Postgres>,
    max_attempts: u32,
}

impl ArchiveTaskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            max_attempts: RetryConfig::default().max_attempts,
        }
    }

    /// Delivery budget stamped on newly enqueued tasks.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    async fn insert_new(&self, request: &ArchiveRequest) -> Result<Option<ArchiveTask>, AppError> {
        let row = sqlx::query_as::<_, ArchiveTaskRow>(
            r#"
            INSERT INTO archive_tasks (url, entry_id, link_index, max_attempts)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (entry_id, link_index, url) WHERE status IN ('pending', 'running')
            DO NOTHING
            RETURNING *
            "#,
        )
        .bind(&request.url)
        .bind(&request.entry_id)
        .bind(link_index_param(request.link_index)?)
        .bind(self.max_attempts as i32)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.map(Into::into))
    }

    async fn find_active(&self, request: &ArchiveRequest) -> Result<Option<ArchiveTask>, AppError> {
        let row = sqlx::query_as::<_, ArchiveTaskRow>(
            r#"
            SELECT * FROM archive_tasks
            WHERE entry_id = $1 AND link_index = $2 AND url = $3
              AND status IN ('pending', 'running')
            "#,
        )
        .bind(&request.entry_id)
        .bind(link_index_param(request.link_index)?)
        .bind(&request.url)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.map(Into::into))
    }
}

pub(crate) fn link_index_param(link_index: usize) -> Result<i32, AppError> {
    i32::try_from(link_index)
        .map_err(|_| AppError::Generic(format!("Link index {link_index} out of range")))
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct ArchiveTaskRow {
    id: Uuid,
    url: String,
    entry_id: String,
    link_index: i32,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    attempts: i32,
    max_attempts: i32,
    next_retry_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    worker_id: Option<String>,
}

impl From<ArchiveTaskRow> for ArchiveTask {
    fn from(row: ArchiveTaskRow) -> Self {
        ArchiveTask {
            id: row.id,
            url: row.url,
            entry_id: row.entry_id,
            link_index: row.link_index as usize,
            status: row.status.parse().unwrap_or(TaskStatus::Pending),
            created_at: row.created_at,
            updated_at: row.updated_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            attempts: row.attempts as u32,
            max_attempts: row.max_attempts as u32,
            next_retry_at: row.next_retry_at,
            last_error: row.last_error,
            worker_id: row.worker_id,
        }
    }
}

impl TaskQueue for ArchiveTaskRepository {
    async fn enqueue(&self, request: &ArchiveRequest) -> Result<ArchiveTask, AppError> {
        // The active task can finish between the conflicting insert and the
        // lookup; a second round then inserts a fresh one.
        for _ in 0..2 {
            if let Some(task) = self.insert_new(request).await? {
                return Ok(task);
            }
            if let Some(existing) = self.find_active(request).await? {
                tracing::debug!(
                    task_id = %existing.id,
                    entry_id = %request.entry_id,
                    link_index = request.link_index,
                    "Archive task already queued"
                );
                return Ok(existing);
            }
        }
        Err(AppError::DatabaseError(format!(
            "Could not enqueue archive task for {}#{}",
            request.entry_id, request.link_index
        )))
    }

    async fn claim_task(&self, worker_id: &str) -> Result<Option<ArchiveTask>, AppError> {
        let row = sqlx::query_as::<_, ArchiveTaskRow>(
            r#"
            UPDATE archive_tasks
            SET status = 'running', worker_id = $1, started_at = NOW(), updated_at = NOW(),
                attempts = attempts + 1
            WHERE id = (
                SELECT id FROM archive_tasks
                WHERE status = 'pending'
                  AND (next_retry_at IS NULL OR next_retry_at <= NOW())
                ORDER BY next_retry_at NULLS FIRST, created_at ASC
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(worker_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.map(Into::into))
    }

    async fn complete_task(&self, task_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE archive_tasks
            SET status = 'completed', completed_at = NOW(), updated_at = NOW(),
                last_error = NULL, worker_id = NULL
            WHERE id = $1
            "#,
        )
        .bind(task_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn fail_task(
        &self,
        task_id: Uuid,
        error: &str,
        next_retry_at: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        // With a retry time the task goes back to pending, otherwise it is final.
        sqlx::query(
            r#"
            UPDATE archive_tasks
            SET
                status = CASE WHEN $3::timestamptz IS NOT NULL THEN 'pending' ELSE 'failed' END,
                next_retry_at = $3,
                last_error = $2,
                updated_at = NOW(),
                worker_id = NULL,
                started_at = CASE WHEN $3::timestamptz IS NOT NULL THEN NULL ELSE started_at END,
                completed_at = CASE WHEN $3::timestamptz IS NOT NULL THEN NULL ELSE NOW() END
            WHERE id = $1
            "#,
        )
        .bind(task_id)
        .bind(error)
        .bind(next_retry_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn get_task(&self, task_id: Uuid) -> Result<Option<ArchiveTask>, AppError> {
        let row =
            sqlx::query_as::<_, ArchiveTaskRow>(r#"SELECT * FROM archive_tasks WHERE id = $1"#)
                .bind(task_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.map(Into::into))
    }

    async fn list_tasks(
        &self,
        status: Option<TaskStatus>,
        limit: usize,
    ) -> Result<Vec<ArchiveTask>, AppError> {
        let rows = if let Some(status) = status {
            sqlx::query_as::<_, ArchiveTaskRow>(
                r#"
                SELECT * FROM archive_tasks
                WHERE status = $1
                ORDER BY created_at DESC
                LIMIT $2
                "#,
            )
            .bind(status.as_str())
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, ArchiveTaskRow>(
                r#"
                SELECT * FROM archive_tasks
                ORDER BY created_at DESC
                LIMIT $1
                "#,
            )
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn release_worker_tasks(&self, worker_id: &str) -> Result<u64, AppError> {
        // Released deliveries were interrupted, not attempted: give the attempt back.
        let result = sqlx::query(
            r#"
            UPDATE archive_tasks
            SET status = 'pending', worker_id = NULL, started_at = NULL, updated_at = NOW(),
                attempts = GREATEST(attempts - 1, 0)
            WHERE worker_id = $1 AND status = 'running'
            "#,
        )
        .bind(worker_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn count_by_status(&self, status: TaskStatus) -> Result<i64, AppError> {
        let (count,): (i64,) =
            sqlx::query_as(r#"SELECT COUNT(*) FROM archive_tasks WHERE status = $1"#)
                .bind(status.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(count)
    }
}
