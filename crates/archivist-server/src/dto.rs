use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use archivist_core::task::ArchiveTask;
use archivist_core::{ArchiveRequest, Entry, Link, TaskOutcome};

// ---------------------------------------------------------------------------
// Archive tasks (consumer endpoint)
// ---------------------------------------------------------------------------

/// Task payload: one link on one entry.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ArchiveTaskPayload {
    /// Link target to archive
    pub url: String,
    /// Entry identifier
    pub id: String,
    /// Position of the link in the entry's link list
    #[serde(rename = "linkIndex")]
    pub link_index: usize,
}

impl From<ArchiveTaskPayload> for ArchiveRequest {
    fn from(p: ArchiveTaskPayload) -> Self {
        ArchiveRequest::new(p.url, p.id, p.link_index)
    }
}

impl From<ArchiveRequest> for ArchiveTaskPayload {
    fn from(r: ArchiveRequest) -> Self {
        Self {
            url: r.url,
            id: r.entry_id,
            link_index: r.link_index,
        }
    }
}

/// Final result of a delivered task. Returned with 200 so the task is not redelivered.
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveOutcomeResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<TaskOutcome> for ArchiveOutcomeResponse {
    fn from(o: TaskOutcome) -> Self {
        Self {
            success: o.success,
            archive_url: o.archive_url,
            retryable: o.retryable,
            error: o.error,
        }
    }
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LinkDto {
    #[serde(default)]
    pub link_text: String,
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_href: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_task_queued: Option<bool>,
}

impl From<LinkDto> for Link {
    fn from(l: LinkDto) -> Self {
        Link {
            link_text: l.link_text,
            href: l.href,
            extra_text: l.extra_text,
            archive_href: l.archive_href,
            archive_task_queued: l.archive_task_queued,
        }
    }
}

impl From<Link> for LinkDto {
    fn from(l: Link) -> Self {
        Self {
            link_text: l.link_text,
            href: l.href,
            extra_text: l.extra_text,
            archive_href: l.archive_href,
            archive_task_queued: l.archive_task_queued,
        }
    }
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct EntryRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub links: Vec<LinkDto>,
}

impl EntryRequest {
    pub fn into_entry(self, id: String) -> Entry {
        Entry {
            id,
            title: self.title,
            links: self.links.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct EntryResponse {
    pub id: String,
    pub title: String,
    pub links: Vec<LinkDto>,
}

impl From<Entry> for EntryResponse {
    fn from(e: Entry) -> Self {
        Self {
            id: e.id,
            title: e.title,
            links: e.links.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct PutEntryResponse {
    pub entry: EntryResponse,
    /// Archive tasks enqueued by this write
    pub enqueued: Vec<ArchiveTaskPayload>,
}

// ---------------------------------------------------------------------------
// Task queue
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TaskResponse {
    pub id: Uuid,
    pub url: String,
    pub entry_id: String,
    pub link_index: usize,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub attempts: u32,
    pub max_attempts: u32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub worker_id: Option<String>,
}

impl From<ArchiveTask> for TaskResponse {
    fn from(task: ArchiveTask) -> Self {
        Self {
            id: task.id,
            url: task.url,
            entry_id: task.entry_id,
            link_index: task.link_index,
            status: task.status.to_string(),
            created_at: task.created_at,
            updated_at: task.updated_at,
            started_at: task.started_at,
            completed_at: task.completed_at,
            attempts: task.attempts,
            max_attempts: task.max_attempts,
            next_retry_at: task.next_retry_at,
            last_error: task.last_error,
            worker_id: task.worker_id,
        }
    }
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListTasksQuery {
    pub status: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TaskListResponse {
    pub tasks: Vec<TaskResponse>,
    pub total: usize,
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
