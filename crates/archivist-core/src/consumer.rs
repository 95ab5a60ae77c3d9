use serde::Serialize;

use crate::error::AppError;
use crate::models::{ArchiveRequest, ArchiveResult};
use crate::orchestrator::CaptureOrchestrator;
use crate::report::{ArchiveEvent, ArchiveReporter, TracingArchiveReporter};
use crate::traits::{CaptureApi, EntryStore};

/// Body returned to the task system when a task is finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What the task system should do with a delivered task.
///
/// `Done` maps to a 2xx response (stop redelivery), `Redeliver` to a non-2xx
/// response. The task system treats every non-2xx as "deliver again".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskResponse {
    Done(TaskOutcome),
    Redeliver { reason: String },
}

impl TaskResponse {
    pub fn is_done(&self) -> bool {
        matches!(self, TaskResponse::Done(_))
    }
}

/// Handles one delivered [`ArchiveRequest`] end to end.
pub struct TaskConsumer<A, S, R = TracingArchiveReporter>
where
    A: CaptureApi,
    S: EntryStore,
    R: ArchiveReporter,
{
    orchestrator: CaptureOrchestrator<A, R>,
    store: S,
}

impl<A, S, R> TaskConsumer<A, S, R>
where
    A: CaptureApi,
    S: EntryStore,
    R: ArchiveReporter,
{
    pub fn new(orchestrator: CaptureOrchestrator<A, R>, store: S) -> Self {
        Self {
            orchestrator,
            store,
        }
    }

    /// Run the archive attempt and decide between done and redeliver.
    ///
    /// | Outcome                              | Response                    |
    /// |--------------------------------------|-----------------------------|
    /// | archived, entry updated              | done, `success: true`       |
    /// | archived, entry/link gone or write failed | done, `success: false` |
    /// | failed, retryable                    | redeliver                   |
    /// | failed, not retryable                | done, `success: false`      |
    /// | invocation budget exhausted          | redeliver                   |
    pub async fn handle(&self, request: &ArchiveRequest) -> TaskResponse {
        let budget = self.orchestrator.config().deadline;
        match tokio::time::timeout(budget, self.process(request)).await {
            Ok(response) => response,
            Err(_) => {
                let reason = AppError::DeadlineExceeded(budget.as_secs()).to_string();
                tracing::warn!(
                    entry_id = %request.entry_id,
                    link_index = request.link_index,
                    %reason,
                    "Archive invocation timed out"
                );
                TaskResponse::Redeliver { reason }
            }
        }
    }

    async fn process(&self, request: &ArchiveRequest) -> TaskResponse {
        match self.orchestrator.ensure_archived(&request.url).await {
            ArchiveResult::Archived { archive_url } => {
                self.record_archive(request, archive_url).await
            }
            ArchiveResult::Failed {
                retryable: true,
                reason,
            } => TaskResponse::Redeliver { reason },
            ArchiveResult::Failed {
                retryable: false,
                reason,
            } => TaskResponse::Done(TaskOutcome {
                success: false,
                archive_url: None,
                retryable: Some(false),
                error: Some(reason),
            }),
        }
    }

    /// Write the archive URL onto the link. A failed update is terminal for
    /// this task: the payload can never point at a different link.
    async fn record_archive(&self, request: &ArchiveRequest, archive_url: String) -> TaskResponse {
        let update = self
            .store
            .set_link_archive(
                &request.entry_id,
                request.link_index,
                &request.url,
                &archive_url,
            )
            .await;

        match update {
            Ok(()) => {
                self.orchestrator.report(ArchiveEvent::EntryUpdated {
                    entry_id: &request.entry_id,
                    link_index: request.link_index,
                    archive_url: &archive_url,
                });
                TaskResponse::Done(TaskOutcome {
                    success: true,
                    archive_url: Some(archive_url),
                    retryable: None,
                    error: None,
                })
            }
            Err(e) => {
                let error = e.to_string();
                self.orchestrator.report(ArchiveEvent::EntryUpdateFailed {
                    entry_id: &request.entry_id,
                    link_index: request.link_index,
                    error: &error,
                });
                TaskResponse::Done(TaskOutcome {
                    success: false,
                    archive_url: Some(archive_url),
                    retryable: None,
                    error: Some(error),
                })
            }
        }
    }
}
