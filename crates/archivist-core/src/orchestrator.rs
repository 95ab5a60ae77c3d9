use chrono::Utc;
use tokio::time::Instant;

use crate::config::ArchiveConfig;
use crate::error::AppError;
use crate::freshness::FreshCaptureLookup;
use crate::models::ArchiveResult;
use crate::poller::CaptureJobPoller;
use crate::report::{ArchiveEvent, ArchiveReporter, TracingArchiveReporter};
use crate::traits::CaptureApi;

/// Ensures a recent archived snapshot exists for a URL.
///
/// Pipeline: freshness lookup → submit capture → poll to completion → compose
/// archive URL. Each call is a single end-to-end attempt; retrying the whole
/// operation is the task queue's job.
#[derive(Clone)]
pub struct CaptureOrchestrator<A, R = TracingArchiveReporter>
where
    A: CaptureApi,
    R: ArchiveReporter,
{
    api: A,
    lookup: FreshCaptureLookup<A>,
    poller: CaptureJobPoller<A>,
    config: ArchiveConfig,
    pub(crate) reporter: R,
}

impl<A: CaptureApi> CaptureOrchestrator<A> {
    pub fn new(api: A, config: ArchiveConfig) -> Self {
        Self {
            lookup: FreshCaptureLookup::new(api.clone()),
            poller: CaptureJobPoller::new(api.clone(), &config),
            api,
            config,
            reporter: TracingArchiveReporter,
        }
    }
}

impl<A, R> CaptureOrchestrator<A, R>
where
    A: CaptureApi,
    R: ArchiveReporter,
{
    /// Replace the event reporter.
    pub fn with_reporter<R2: ArchiveReporter>(self, reporter: R2) -> CaptureOrchestrator<A, R2> {
        CaptureOrchestrator {
            api: self.api,
            lookup: self.lookup,
            poller: self.poller,
            config: self.config,
            reporter,
        }
    }

    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    pub(crate) fn report(&self, event: ArchiveEvent<'_>) {
        self.reporter.report(event);
    }

    /// Produce an archive URL for `url`, or a classified failure.
    ///
    /// 1. Reuse a snapshot younger than 24h if the provider has one
    /// 2. Otherwise submit a capture job
    /// 3. Poll it until it terminates or the invocation deadline is reached
    /// 4. Compose `{web_base}/web/{timestamp}/{url}`
    pub async fn ensure_archived(&self, url: &str) -> ArchiveResult {
        let deadline = Instant::now() + self.config.deadline;

        if let Some(archive_url) = self.lookup.find_recent(url, Utc::now()).await {
            self.report(ArchiveEvent::SnapshotReused {
                url,
                archive_url: &archive_url,
            });
            return ArchiveResult::Archived { archive_url };
        }

        match self.capture(url, deadline).await {
            Ok(archive_url) => ArchiveResult::Archived { archive_url },
            Err(e) => {
                let retryable = is_retryable_capture_error(&e);
                let reason = e.to_string();
                self.report(ArchiveEvent::CaptureFailed {
                    url,
                    reason: &reason,
                    retryable,
                });
                ArchiveResult::Failed { retryable, reason }
            }
        }
    }

    async fn capture(&self, url: &str, deadline: Instant) -> Result<String, AppError> {
        let job = self.api.submit(url).await?;
        self.report(ArchiveEvent::CaptureSubmitted {
            url,
            job_id: &job.job_id,
        });

        let timestamp = self.poller.await_completion(&job.job_id, deadline).await?;
        let archive_url = self.config.archive_url(&timestamp, url);
        self.report(ArchiveEvent::CaptureSucceeded {
            url,
            job_id: &job.job_id,
            archive_url: &archive_url,
        });
        Ok(archive_url)
    }
}

/// Only a failure the provider explicitly classified can be terminal.
/// Transport errors, deadlines and anything unexpected are worth another try.
fn is_retryable_capture_error(error: &AppError) -> bool {
    match error {
        AppError::CaptureJob { retryable, .. } => *retryable,
        _ => true,
    }
}
