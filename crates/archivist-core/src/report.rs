/// State transitions of one archive invocation, for monitoring/logging.
#[derive(Debug, Clone)]
pub enum ArchiveEvent<'a> {
    /// A snapshot younger than the freshness window was found and reused.
    SnapshotReused {
        url: &'a str,
        archive_url: &'a str,
    },
    CaptureSubmitted {
        url: &'a str,
        job_id: &'a str,
    },
    CaptureSucceeded {
        url: &'a str,
        job_id: &'a str,
        archive_url: &'a str,
    },
    CaptureFailed {
        url: &'a str,
        reason: &'a str,
        retryable: bool,
    },
    EntryUpdated {
        entry_id: &'a str,
        link_index: usize,
        archive_url: &'a str,
    },
    EntryUpdateFailed {
        entry_id: &'a str,
        link_index: usize,
        error: &'a str,
    },
}

/// Trait for receiving archive events (decoupled logging).
pub trait ArchiveReporter: Send + Sync {
    fn report(&self, event: ArchiveEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingArchiveReporter;

impl ArchiveReporter for TracingArchiveReporter {
    fn report(&self, event: ArchiveEvent<'_>) {
        match event {
            ArchiveEvent::SnapshotReused { url, archive_url } => {
                tracing::info!(%url, %archive_url, "Recent snapshot reused");
            }
            ArchiveEvent::CaptureSubmitted { url, job_id } => {
                tracing::info!(%url, %job_id, "Capture submitted");
            }
            ArchiveEvent::CaptureSucceeded {
                url,
                job_id,
                archive_url,
            } => {
                tracing::info!(%url, %job_id, %archive_url, "Capture succeeded");
            }
            ArchiveEvent::CaptureFailed {
                url,
                reason,
                retryable,
            } => {
                tracing::warn!(%url, %reason, %retryable, "Capture failed");
            }
            ArchiveEvent::EntryUpdated {
                entry_id,
                link_index,
                archive_url,
            } => {
                tracing::info!(%entry_id, %link_index, %archive_url, "Entry updated");
            }
            ArchiveEvent::EntryUpdateFailed {
                entry_id,
                link_index,
                error,
            } => {
                // TODO: surface these to an operator alert channel instead of logs only
                tracing::error!(%entry_id, %link_index, %error, "Entry update failed");
            }
        }
    }
}
