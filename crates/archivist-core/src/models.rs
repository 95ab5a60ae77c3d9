use serde::{Deserialize, Serialize};

/// One link on one entry that needs an archived snapshot.
///
/// This is the task payload delivered to the consumer, so the wire names
/// (`id`, `linkIndex`) are part of the task contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveRequest {
    pub url: String,
    #[serde(rename = "id")]
    pub entry_id: String,
    #[serde(rename = "linkIndex")]
    pub link_index: usize,
}

impl ArchiveRequest {
    pub fn new(url: impl Into<String>, entry_id: impl Into<String>, link_index: usize) -> Self {
        Self {
            url: url.into(),
            entry_id: entry_id.into(),
            link_index,
        }
    }
}

/// A capture job accepted by the archive provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureJob {
    pub job_id: String,
    pub submitted_url: String,
}

/// Interpreted state of a capture job after one status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    Pending,
    Success { timestamp: String },
    Failed { code: String, retryable: bool },
}

/// Raw status payload returned by the provider's status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StatusPayload {
    #[serde(default)]
    pub status: String,
    pub timestamp: Option<String>,
    pub status_ext: Option<String>,
    pub message: Option<String>,
}

/// Closest-snapshot metadata from the availability endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClosestSnapshot {
    pub timestamp: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub available: bool,
    pub url: String,
}

/// Final output of one archive attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveResult {
    Archived { archive_url: String },
    Failed { retryable: bool, reason: String },
}

impl ArchiveResult {
    pub fn archive_url(&self) -> Option<&str> {
        match self {
            ArchiveResult::Archived { archive_url } => Some(archive_url),
            ArchiveResult::Failed { .. } => None,
        }
    }
}

/// A content entry as far as archiving is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub links: Vec<Link>,
}

/// A link referenced by an entry, plus its archive state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
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

impl Link {
    pub fn new(link_text: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            link_text: link_text.into(),
            href: href.into(),
            ..Self::default()
        }
    }

    pub fn is_archived(&self) -> bool {
        self.archive_href.is_some()
    }

    pub fn is_queued(&self) -> bool {
        self.archive_task_queued.unwrap_or(false)
    }

    /// Neither archived nor already queued.
    pub fn needs_archive(&self) -> bool {
        !self.is_archived() && !self.is_queued()
    }
}

impl Entry {
    /// Carry archive state over from the stored version of this entry.
    ///
    /// An incoming write usually omits `archiveHref` / `archiveTaskQueued`.
    /// Links whose href is unchanged at the same index keep the stored state,
    /// so an edit does not re-archive or double-enqueue them.
    pub fn merge_archive_state(&mut self, previous: &Entry) {
        for (link, old) in self.links.iter_mut().zip(previous.links.iter()) {
            if link.href != old.href {
                continue;
            }
            if link.archive_href.is_none() {
                link.archive_href = old.archive_href.clone();
            }
            if link.archive_task_queued.is_none() && link.archive_href.is_none() {
                link.archive_task_queued = old.archive_task_queued;
            }
        }
    }
}
