use crate::error::AppError;
use crate::models::{ArchiveRequest, Entry, Link};
use crate::task_queue::TaskQueue;
use crate::traits::EntryStore;

/// Indices of links that are neither archived nor already queued.
pub fn pending_links(entry: &Entry) -> Vec<usize> {
    entry
        .links
        .iter()
        .enumerate()
        .filter(|(_, link)| link.needs_archive())
        .map(|(index, _)| index)
        .collect()
}

/// Mark the listed links as queued, skipping any that were archived or
/// queued in the meantime. Returns the indices that were actually claimed.
///
/// Stores call this inside whatever makes their read-modify-write atomic.
pub fn claim_pending(links: &mut [Link], indices: &[usize]) -> Vec<usize> {
    let mut claimed = Vec::new();
    for &index in indices {
        if let Some(link) = links.get_mut(index) {
            if link.needs_archive() && !claimed.contains(&index) {
                link.archive_task_queued = Some(true);
                claimed.push(index);
            }
        }
    }
    claimed
}

/// Drop the queued flag from the listed links that have not been archived.
pub fn release_claims(links: &mut [Link], indices: &[usize]) {
    for &index in indices {
        if let Some(link) = links.get_mut(index) {
            if !link.is_archived() {
                link.archive_task_queued = None;
            }
        }
    }
}

/// Enqueues one archive task per link that still needs one.
///
/// Runs on every entry write. Links are claimed in the store before their
/// tasks are enqueued, so overlapping writes of the same entry cannot
/// enqueue the same link twice.
#[derive(Clone)]
pub struct TaskDispatcher<S: EntryStore, Q: TaskQueue> {
    store: S,
    queue: Q,
}

impl<S: EntryStore, Q: TaskQueue> TaskDispatcher<S, Q> {
    pub fn new(store: S, queue: Q) -> Self {
        Self { store, queue }
    }

    /// Claim and enqueue every pending link of `entry`.
    ///
    /// If enqueuing fails part-way, the claims of links not yet enqueued are
    /// released so the next write picks them up again.
    pub async fn dispatch(&self, entry: &Entry) -> Result<Vec<ArchiveRequest>, AppError> {
        let candidates = pending_links(entry);
        if candidates.is_empty() {
            tracing::debug!(entry_id = %entry.id, "No links need archiving");
            return Ok(Vec::new());
        }

        let claimed = self.store.claim_links(&entry.id, &candidates).await?;
        let mut enqueued = Vec::with_capacity(claimed.len());

        for (position, &index) in claimed.iter().enumerate() {
            let Some(link) = entry.links.get(index) else {
                self.release(&entry.id, &[index]).await;
                continue;
            };
            let request = ArchiveRequest::new(link.href.clone(), entry.id.clone(), index);

            if let Err(e) = self.queue.enqueue(&request).await {
                tracing::error!(
                    entry_id = %entry.id,
                    link_index = index,
                    error = %e,
                    "Failed to enqueue archive task"
                );
                self.release(&entry.id, &claimed[position..]).await;
                return Err(e);
            }

            tracing::info!(
                entry_id = %entry.id,
                link_index = index,
                url = %request.url,
                "Archive task enqueued"
            );
            enqueued.push(request);
        }

        Ok(enqueued)
    }

    async fn release(&self, entry_id: &str, indices: &[usize]) {
        if let Err(e) = self.store.release_links(entry_id, indices).await {
            tracing::error!(%entry_id, ?indices, error = %e, "Failed to release link claims");
        }
    }
}
