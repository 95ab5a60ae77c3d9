use crate::classify;
use crate::error::AppError;
use crate::models::{CaptureOutcome, StatusPayload};
use crate::traits::CaptureApi;

/// Queries the status of a capture job and interprets the provider payload.
#[derive(Clone)]
pub struct CaptureStatusClient<A: CaptureApi> {
    api: A,
}

impl<A: CaptureApi> CaptureStatusClient<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    /// One status query. Transport errors propagate unchanged: they mean the
    /// query failed, not the job.
    pub async fn check_status(&self, job_id: &str) -> Result<CaptureOutcome, AppError> {
        let payload = self.api.capture_status(job_id).await?;
        interpret_status(payload)
    }
}

/// Map a raw status payload onto a [`CaptureOutcome`].
///
/// `success` without a timestamp cannot be turned into an archive URL and is
/// reported as a malformed response.
pub fn interpret_status(payload: StatusPayload) -> Result<CaptureOutcome, AppError> {
    match payload.status.as_str() {
        "success" => match payload.timestamp {
            Some(timestamp) if !timestamp.is_empty() => Ok(CaptureOutcome::Success { timestamp }),
            _ => Err(AppError::HttpError(
                "Capture status 'success' without a timestamp".to_string(),
            )),
        },
        "error" => {
            let code = payload.status_ext.unwrap_or_default();
            let retryable = classify::is_retryable(&code);
            tracing::debug!(
                code = %code,
                retryable,
                message = payload.message.as_deref().unwrap_or(""),
                "Capture job reported an error"
            );
            Ok(CaptureOutcome::Failed { code, retryable })
        }
        _ => Ok(CaptureOutcome::Pending),
    }
}
