use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::ArchiveRequest;
use crate::task::{ArchiveTask, TaskStatus};

/// At-least-once queue of archive tasks.
///
/// Implementations must support atomic claiming via `SELECT FOR UPDATE SKIP LOCKED`
/// or equivalent so a task is delivered to one worker at a time.
pub trait TaskQueue: Send + Sync + Clone {
    /// Enqueue one archive request.
    ///
    /// If an undelivered task for the same entry and link already exists,
    /// that task is returned instead of creating a duplicate.
    fn enqueue(
        &self,
        request: &ArchiveRequest,
    ) -> impl Future<Output = Result<ArchiveTask, AppError>> + Send;

    /// Atomically claim the next deliverable task. Increments its attempt count.
    ///
    /// Returns `None` if no tasks are due.
    fn claim_task(
        &self,
        worker_id: &str,
    ) -> impl Future<Output = Result<Option<ArchiveTask>, AppError>> + Send;

    fn complete_task(&self, task_id: Uuid) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Record a failed delivery. If `next_retry_at` is provided, the task goes
    /// back to `pending` for redelivery; otherwise it is marked `failed`.
    fn fail_task(
        &self,
        task_id: Uuid,
        error: &str,
        next_retry_at: Option<DateTime<Utc>>,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    fn get_task(
        &self,
        task_id: Uuid,
    ) -> impl Future<Output = Result<Option<ArchiveTask>, AppError>> + Send;

    fn list_tasks(
        &self,
        status: Option<TaskStatus>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ArchiveTask>, AppError>> + Send;

    /// Put all tasks held by a worker back to `pending` (graceful shutdown).
    fn release_worker_tasks(
        &self,
        worker_id: &str,
    ) -> impl Future<Output = Result<u64, AppError>> + Send;

    fn count_by_status(
        &self,
        status: TaskStatus,
    ) -> impl Future<Output = Result<i64, AppError>> + Send;
}
