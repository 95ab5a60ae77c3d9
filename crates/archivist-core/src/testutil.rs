//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeDelta, Utc};
use uuid::Uuid;

use crate::dispatch::{claim_pending, release_claims};
use crate::error::AppError;
use crate::models::{ArchiveRequest, CaptureJob, ClosestSnapshot, Entry, Link, StatusPayload};
use crate::report::{ArchiveEvent, ArchiveReporter};
use crate::task::{ArchiveTask, TaskStatus};
use crate::task_queue::TaskQueue;
use crate::traits::{CaptureApi, EntryStore};
use crate::worker::{WorkerEvent, WorkerReporter};

// ---------------------------------------------------------------------------
// MockCaptureApi
// ---------------------------------------------------------------------------

/// Mock archive provider.
///
/// Status responses are served from a queue; once it is drained every query
/// answers `pending`. The availability lookup returns no snapshot unless
/// configured otherwise.
#[derive(Clone)]
pub struct MockCaptureApi {
    job_id: Arc<Mutex<String>>,
    submit_error: Arc<Mutex<Option<AppError>>>,
    statuses: Arc<Mutex<Vec<Result<StatusPayload, AppError>>>>,
    hang_status: bool,
    snapshot: Arc<Mutex<Option<Result<Option<ClosestSnapshot>, AppError>>>>,
    submitted: Arc<Mutex<Vec<String>>>,
    status_calls: Arc<Mutex<usize>>,
}

impl Default for MockCaptureApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCaptureApi {
    pub fn new() -> Self {
        Self {
            job_id: Arc::new(Mutex::new("job-1".to_string())),
            submit_error: Arc::new(Mutex::new(None)),
            statuses: Arc::new(Mutex::new(Vec::new())),
            hang_status: false,
            snapshot: Arc::new(Mutex::new(None)),
            submitted: Arc::new(Mutex::new(Vec::new())),
            status_calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_job(self, job_id: &str) -> Self {
        *self.job_id.lock().unwrap() = job_id.to_string();
        self
    }

    pub fn with_submit_error(self, error: AppError) -> Self {
        *self.submit_error.lock().unwrap() = Some(error);
        self
    }

    pub fn with_statuses(self, statuses: Vec<Result<StatusPayload, AppError>>) -> Self {
        *self.statuses.lock().unwrap() = statuses;
        self
    }

    /// Status queries never return.
    pub fn with_hanging_status(mut self) -> Self {
        self.hang_status = true;
        self
    }

    /// Response of the availability lookup. Served on every call.
    pub fn with_snapshot(self, snapshot: Result<Option<ClosestSnapshot>, AppError>) -> Self {
        *self.snapshot.lock().unwrap() = Some(snapshot);
        self
    }

    pub fn submit_calls(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }

    pub fn submitted_urls(&self) -> Vec<String> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn status_calls(&self) -> usize {
        *self.status_calls.lock().unwrap()
    }
}

impl CaptureApi for MockCaptureApi {
    async fn submit(&self, url: &str) -> Result<CaptureJob, AppError> {
        self.submitted.lock().unwrap().push(url.to_string());
        if let Some(e) = self.submit_error.lock().unwrap().take() {
            return Err(e);
        }
        Ok(CaptureJob {
            job_id: self.job_id.lock().unwrap().clone(),
            submitted_url: url.to_string(),
        })
    }

    async fn capture_status(&self, _job_id: &str) -> Result<StatusPayload, AppError> {
        *self.status_calls.lock().unwrap() += 1;
        if self.hang_status {
            std::future::pending::<()>().await;
        }
        let next = {
            let mut statuses = self.statuses.lock().unwrap();
            if statuses.is_empty() {
                None
            } else {
                Some(statuses.remove(0))
            }
        };
        next.unwrap_or_else(|| Ok(pending()))
    }

    async fn closest_snapshot(&self, _url: &str) -> Result<Option<ClosestSnapshot>, AppError> {
        let snapshot = self.snapshot.lock().unwrap();
        match snapshot.as_ref() {
            None | Some(Ok(None)) => Ok(None),
            Some(Ok(Some(snap))) => Ok(Some(snap.clone())),
            Some(Err(e)) => Err(AppError::Generic(e.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// MockEntryStore
// ---------------------------------------------------------------------------

/// In-memory entry store with optional injected failures.
#[derive(Clone, Default)]
pub struct MockEntryStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    claim_error: Arc<Mutex<Option<AppError>>>,
    update_error: Arc<Mutex<Option<AppError>>>,
    claim_calls: Arc<Mutex<usize>>,
}

impl MockEntryStore {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_entry(entry: Entry) -> Self {
        let store = Self::default();
        store
            .entries
            .lock()
            .unwrap()
            .insert(entry.id.clone(), entry);
        store
    }

    /// Next `claim_links` call fails.
    pub fn with_claim_error(self, error: AppError) -> Self {
        *self.claim_error.lock().unwrap() = Some(error);
        self
    }

    /// Next `set_link_archive` call fails.
    pub fn with_update_error(self, error: AppError) -> Self {
        *self.update_error.lock().unwrap() = Some(error);
        self
    }

    pub fn entry(&self, id: &str) -> Option<Entry> {
        self.entries.lock().unwrap().get(id).cloned()
    }

    pub fn claim_calls(&self) -> usize {
        *self.claim_calls.lock().unwrap()
    }
}

impl EntryStore for MockEntryStore {
    async fn get_entry(&self, id: &str) -> Result<Option<Entry>, AppError> {
        Ok(self.entry(id))
    }

    async fn upsert_entry(&self, mut entry: Entry) -> Result<Entry, AppError> {
        let mut entries = self.entries.lock().unwrap();
        if let Some(previous) = entries.get(&entry.id) {
            entry.merge_archive_state(previous);
        }
        entries.insert(entry.id.clone(), entry.clone());
        Ok(entry)
    }

    async fn claim_links(&self, entry_id: &str, indices: &[usize]) -> Result<Vec<usize>, AppError> {
        *self.claim_calls.lock().unwrap() += 1;
        if let Some(e) = self.claim_error.lock().unwrap().take() {
            return Err(e);
        }
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .get_mut(entry_id)
            .ok_or_else(|| AppError::EntryNotFound(entry_id.to_string()))?;
        Ok(claim_pending(&mut entry.links, indices))
    }

    async fn release_links(&self, entry_id: &str, indices: &[usize]) -> Result<(), AppError> {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(entry_id) {
            release_claims(&mut entry.links, indices);
        }
        Ok(())
    }

    async fn set_link_archive(
        &self,
        entry_id: &str,
        link_index: usize,
        href: &str,
        archive_url: &str,
    ) -> Result<(), AppError> {
        if let Some(e) = self.update_error.lock().unwrap().take() {
            return Err(e);
        }
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .get_mut(entry_id)
            .ok_or_else(|| AppError::EntryNotFound(entry_id.to_string()))?;
        let link = entry
            .links
            .get_mut(link_index)
            .ok_or_else(|| AppError::LinkNotFound {
                entry_id: entry_id.to_string(),
                link_index,
            })?;
        if link.href != href {
            return Err(AppError::LinkChanged {
                entry_id: entry_id.to_string(),
                link_index,
            });
        }
        link.archive_href = Some(archive_url.to_string());
        link.archive_task_queued = None;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockTaskQueue
// ---------------------------------------------------------------------------

/// Recorded failure: (task_id, error_message, next_retry_at).
pub type FailedTaskRecord = (Uuid, String, Option<DateTime<Utc>>);

/// Mock task queue backed by an in-memory Vec.
#[derive(Clone, Default)]
pub struct MockTaskQueue {
    tasks: Arc<Mutex<Vec<ArchiveTask>>>,
    enqueue_calls: Arc<Mutex<usize>>,
    enqueue_error: Arc<Mutex<Option<(usize, AppError)>>>,
    completed: Arc<Mutex<Vec<Uuid>>>,
    failed: Arc<Mutex<Vec<FailedTaskRecord>>>,
    released_workers: Arc<Mutex<Vec<String>>>,
}

impl MockTaskQueue {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Queue with one task ready to be claimed.
    pub fn with_task(task: ArchiveTask) -> Self {
        let queue = Self::default();
        queue.tasks.lock().unwrap().push(task);
        queue
    }

    /// Let the first `succeed` enqueue calls through, then fail once.
    pub fn with_enqueue_error_after(self, succeed: usize, error: AppError) -> Self {
        *self.enqueue_error.lock().unwrap() = Some((succeed, error));
        self
    }

    /// Requests of every task in the queue, in enqueue order.
    pub fn requests(&self) -> Vec<ArchiveRequest> {
        self.tasks
            .lock()
            .unwrap()
            .iter()
            .map(ArchiveTask::request)
            .collect()
    }

    pub fn task(&self, id: Uuid) -> Option<ArchiveTask> {
        self.tasks.lock().unwrap().iter().find(|t| t.id == id).cloned()
    }

    pub fn completed(&self) -> Vec<Uuid> {
        self.completed.lock().unwrap().clone()
    }

    pub fn failed(&self) -> Vec<FailedTaskRecord> {
        self.failed.lock().unwrap().clone()
    }

    pub fn released_workers(&self) -> Vec<String> {
        self.released_workers.lock().unwrap().clone()
    }
}

impl TaskQueue for MockTaskQueue {
    async fn enqueue(&self, request: &ArchiveRequest) -> Result<ArchiveTask, AppError> {
        let call = {
            let mut calls = self.enqueue_calls.lock().unwrap();
            *calls += 1;
            *calls
        };
        {
            let mut injected = self.enqueue_error.lock().unwrap();
            if injected.as_ref().is_some_and(|(succeed, _)| call > *succeed) {
                if let Some((_, e)) = injected.take() {
                    return Err(e);
                }
            }
        }

        let mut tasks = self.tasks.lock().unwrap();
        if let Some(existing) = tasks.iter().find(|t| {
            t.entry_id == request.entry_id
                && t.link_index == request.link_index
                && t.url == request.url
                && !t.status.is_terminal()
        }) {
            return Ok(existing.clone());
        }

        let task = make_task(request);
        tasks.push(task.clone());
        Ok(task)
    }

    async fn claim_task(&self, worker_id: &str) -> Result<Option<ArchiveTask>, AppError> {
        let now = Utc::now();
        let mut tasks = self.tasks.lock().unwrap();
        let due = tasks.iter_mut().find(|t| {
            t.status == TaskStatus::Pending && t.next_retry_at.is_none_or(|at| at <= now)
        });
        Ok(due.map(|task| {
            task.status = TaskStatus::Running;
            task.worker_id = Some(worker_id.to_string());
            task.started_at = Some(now);
            task.attempts += 1;
            task.clone()
        }))
    }

    async fn complete_task(&self, task_id: Uuid) -> Result<(), AppError> {
        self.completed.lock().unwrap().push(task_id);

        let mut tasks = self.tasks.lock().unwrap();
        if let Some(task) = tasks.iter_mut().find(|t| t.id == task_id) {
            task.status = TaskStatus::Completed;
            task.completed_at = Some(Utc::now());
            task.worker_id = None;
        }
        Ok(())
    }

    async fn fail_task(
        &self,
        task_id: Uuid,
        error: &str,
        next_retry_at: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        self.failed
            .lock()
            .unwrap()
            .push((task_id, error.to_string(), next_retry_at));

        let mut tasks = self.tasks.lock().unwrap();
        if let Some(task) = tasks.iter_mut().find(|t| t.id == task_id) {
            task.status = if next_retry_at.is_some() {
                TaskStatus::Pending
            } else {
                TaskStatus::Failed
            };
            task.next_retry_at = next_retry_at;
            task.last_error = Some(error.to_string());
            task.worker_id = None;
        }
        Ok(())
    }

    async fn get_task(&self, task_id: Uuid) -> Result<Option<ArchiveTask>, AppError> {
        Ok(self.task(task_id))
    }

    async fn list_tasks(
        &self,
        status: Option<TaskStatus>,
        limit: usize,
    ) -> Result<Vec<ArchiveTask>, AppError> {
        let tasks = self.tasks.lock().unwrap();
        Ok(tasks
            .iter()
            .filter(|t| status.is_none_or(|s| t.status == s))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn release_worker_tasks(&self, worker_id: &str) -> Result<u64, AppError> {
        self.released_workers
            .lock()
            .unwrap()
            .push(worker_id.to_string());

        let mut tasks = self.tasks.lock().unwrap();
        let mut count = 0u64;
        for task in tasks.iter_mut() {
            if task.worker_id.as_deref() == Some(worker_id) && task.status == TaskStatus::Running {
                task.status = TaskStatus::Pending;
                task.worker_id = None;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn count_by_status(&self, status: TaskStatus) -> Result<i64, AppError> {
        let tasks = self.tasks.lock().unwrap();
        Ok(tasks.iter().filter(|t| t.status == status).count() as i64)
    }
}

// ---------------------------------------------------------------------------
// Reporters
// ---------------------------------------------------------------------------

/// Archive reporter that records event names.
#[derive(Clone, Default)]
pub struct MockArchiveReporter {
    events: Arc<Mutex<Vec<String>>>,
}

impl MockArchiveReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn labels(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl ArchiveReporter for MockArchiveReporter {
    fn report(&self, event: ArchiveEvent<'_>) {
        let label = match &event {
            ArchiveEvent::SnapshotReused { .. } => "SnapshotReused",
            ArchiveEvent::CaptureSubmitted { .. } => "CaptureSubmitted",
            ArchiveEvent::CaptureSucceeded { .. } => "CaptureSucceeded",
            ArchiveEvent::CaptureFailed { .. } => "CaptureFailed",
            ArchiveEvent::EntryUpdated { .. } => "EntryUpdated",
            ArchiveEvent::EntryUpdateFailed { .. } => "EntryUpdateFailed",
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}

/// Worker reporter that records event names.
#[derive(Clone, Default)]
pub struct MockWorkerReporter {
    events: Arc<Mutex<Vec<String>>>,
}

impl MockWorkerReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn labels(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl WorkerReporter for MockWorkerReporter {
    fn report(&self, event: WorkerEvent<'_>) {
        let label = match &event {
            WorkerEvent::Started { .. } => "Started",
            WorkerEvent::Polling => "Polling",
            WorkerEvent::TaskClaimed { .. } => "TaskClaimed",
            WorkerEvent::TaskCompleted { .. } => "TaskCompleted",
            WorkerEvent::TaskRedelivered { .. } => "TaskRedelivered",
            WorkerEvent::ShuttingDown { .. } => "ShuttingDown",
            WorkerEvent::Stopped { .. } => "Stopped",
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

pub fn pending() -> StatusPayload {
    StatusPayload {
        status: "pending".to_string(),
        ..StatusPayload::default()
    }
}

pub fn success(timestamp: &str) -> StatusPayload {
    StatusPayload {
        status: "success".to_string(),
        timestamp: Some(timestamp.to_string()),
        ..StatusPayload::default()
    }
}

pub fn error(code: &str) -> StatusPayload {
    StatusPayload {
        status: "error".to_string(),
        status_ext: Some(code.to_string()),
        message: Some(format!("Capture failed: {code}")),
        ..StatusPayload::default()
    }
}

/// A reusable-looking snapshot of `url` taken `age` ago.
pub fn recent_snapshot(url: &str, age: TimeDelta) -> ClosestSnapshot {
    let timestamp = (Utc::now() - age).format("%Y%m%d%H%M%S").to_string();
    ClosestSnapshot {
        url: format!("https://web.archive.org/web/{timestamp}/{url}"),
        timestamp: Some(timestamp),
        status: Some("200".to_string()),
        available: true,
    }
}

/// Entry `E1` with a single unarchived link to `http://example.com`.
pub fn make_test_entry() -> Entry {
    Entry {
        id: "E1".to_string(),
        title: "Test entry".to_string(),
        links: vec![Link::new("Example", "http://example.com")],
    }
}

/// Pending task for link 0 of entry `E1`.
pub fn make_test_task() -> ArchiveTask {
    make_task(&ArchiveRequest::new("http://example.com", "E1", 0))
}

fn make_task(request: &ArchiveRequest) -> ArchiveTask {
    let now = Utc::now();
    ArchiveTask {
        id: Uuid::new_v4(),
        url: request.url.clone(),
        entry_id: request.entry_id.clone(),
        link_index: request.link_index,
        status: TaskStatus::Pending,
        created_at: now,
        updated_at: now,
        started_at: None,
        completed_at: None,
        attempts: 0,
        max_attempts: 10,
        next_retry_at: None,
        last_error: None,
        worker_id: None,
    }
}
