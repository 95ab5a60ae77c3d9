use std::time::Duration;

use tokio::time::Instant;

use crate::config::ArchiveConfig;
use crate::error::AppError;
use crate::models::CaptureOutcome;
use crate::status::CaptureStatusClient;
use crate::traits::CaptureApi;

/// Drives a capture job to a terminal state by polling its status.
///
/// There is no iteration cap: capture latency varies wildly, so the only bound
/// is the deadline handed in by the caller.
#[derive(Clone)]
pub struct CaptureJobPoller<A: CaptureApi> {
    status: CaptureStatusClient<A>,
    interval: Duration,
    max_status_failures: u32,
}

impl<A: CaptureApi> CaptureJobPoller<A> {
    pub fn new(api: A, config: &ArchiveConfig) -> Self {
        Self {
            status: CaptureStatusClient::new(api),
            interval: config.poll_interval,
            max_status_failures: config.max_status_failures.max(1),
        }
    }

    /// Poll until the job succeeds or fails, returning the capture timestamp.
    ///
    /// - `Failed` ends polling at once with [`AppError::CaptureJob`].
    /// - A status query that fails in transit is retried on the next tick,
    ///   up to `max_status_failures` consecutive failures.
    /// - If the next sleep would cross `deadline`, returns
    ///   [`AppError::DeadlineExceeded`].
    pub async fn await_completion(&self, job_id: &str, deadline: Instant) -> Result<String, AppError> {
        let started = Instant::now();
        let mut attempt = 0u32;
        let mut consecutive_failures = 0u32;

        loop {
            attempt += 1;
            match self.status.check_status(job_id).await {
                Ok(CaptureOutcome::Success { timestamp }) => {
                    tracing::debug!(%job_id, attempt, %timestamp, "Capture complete");
                    return Ok(timestamp);
                }
                Ok(CaptureOutcome::Failed { code, retryable }) => {
                    return Err(AppError::CaptureJob { code, retryable });
                }
                Ok(CaptureOutcome::Pending) => {
                    consecutive_failures = 0;
                    tracing::debug!(%job_id, attempt, "Capture pending");
                }
                Err(e) => {
                    consecutive_failures += 1;
                    if !e.is_retryable() || consecutive_failures >= self.max_status_failures {
                        return Err(e);
                    }
                    tracing::warn!(%job_id, attempt, error = %e, "Status query failed, will re-poll");
                }
            }

            if Instant::now() + self.interval > deadline {
                return Err(AppError::DeadlineExceeded(started.elapsed().as_secs()));
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}
