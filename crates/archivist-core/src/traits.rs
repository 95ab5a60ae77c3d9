use std::future::Future;

use crate::error::AppError;
use crate::models::{CaptureJob, ClosestSnapshot, Entry, StatusPayload};

/// Raw access to the archive provider's HTTP API.
///
/// Implementations only move bytes and decode payloads. Interpreting status
/// payloads and deciding whether a snapshot is reusable happens in the core.
pub trait CaptureApi: Send + Sync + Clone {
    /// Submit a new capture of `url`. Returns the provider's job identifier.
    ///
    /// A submission the provider explicitly rejects with a `status_ext` code
    /// must surface as [`AppError::CaptureJob`] carrying the classifier verdict.
    fn submit(&self, url: &str) -> impl Future<Output = Result<CaptureJob, AppError>> + Send;

    /// Query the status endpoint for a capture job.
    fn capture_status(
        &self,
        job_id: &str,
    ) -> impl Future<Output = Result<StatusPayload, AppError>> + Send;

    /// Ask the availability endpoint for the closest existing snapshot of `url`.
    fn closest_snapshot(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Option<ClosestSnapshot>, AppError>> + Send;
}

/// Persistence for entries and the archive state of their links.
///
/// Every mutation touches only the named link indices, so writers working on
/// different links of the same entry never overwrite each other.
pub trait EntryStore: Send + Sync + Clone {
    fn get_entry(&self, id: &str) -> impl Future<Output = Result<Option<Entry>, AppError>> + Send;

    /// Insert or replace an entry's content, keeping archive state of
    /// unchanged links. Returns the stored entry.
    fn upsert_entry(&self, entry: Entry) -> impl Future<Output = Result<Entry, AppError>> + Send;

    /// Atomically set `archiveTaskQueued` on each listed link that is still
    /// neither archived nor queued. Returns the indices actually claimed.
    fn claim_links(
        &self,
        entry_id: &str,
        indices: &[usize],
    ) -> impl Future<Output = Result<Vec<usize>, AppError>> + Send;

    /// Clear `archiveTaskQueued` on the listed links that are not archived.
    fn release_links(
        &self,
        entry_id: &str,
        indices: &[usize],
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Set `archiveHref` on one link and remove its `archiveTaskQueued` flag.
    ///
    /// The write only lands while the link still points at `href`. Fails with
    /// [`AppError::EntryNotFound`] or [`AppError::LinkNotFound`] when the
    /// target no longer exists, and [`AppError::LinkChanged`] when the link
    /// was edited to a different URL.
    fn set_link_archive(
        &self,
        entry_id: &str,
        link_index: usize,
        href: &str,
        archive_url: &str,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}
