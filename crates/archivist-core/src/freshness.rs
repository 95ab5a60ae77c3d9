use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};

use crate::models::ClosestSnapshot;
use crate::traits::CaptureApi;

/// Snapshots younger than this many hours are reused instead of capturing again.
pub const FRESHNESS_WINDOW_HOURS: i64 = 24;

/// Wayback timestamps: `YYYYMMDDhhmmss`, UTC.
const SNAPSHOT_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Looks for an existing snapshot recent enough to reuse.
#[derive(Clone)]
pub struct FreshCaptureLookup<A: CaptureApi> {
    api: A,
}

impl<A: CaptureApi> FreshCaptureLookup<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    /// Returns the closest snapshot's URL if it is reusable at `now`.
    ///
    /// Lookup failures are swallowed into `None`: a broken freshness check
    /// must never block capturing a new snapshot.
    pub async fn find_recent(&self, url: &str, now: DateTime<Utc>) -> Option<String> {
        match self.api.closest_snapshot(url).await {
            Ok(Some(snapshot)) if is_reusable(&snapshot, now) => Some(snapshot.url),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(%url, error = %e, "Snapshot lookup failed, capturing anew");
                None
            }
        }
    }
}

/// A snapshot is reusable when it has a timestamp, was served with HTTP 200,
/// is marked available, and is strictly younger than [`FRESHNESS_WINDOW_HOURS`].
///
/// A snapshot exactly 24 hours old is not reused.
pub fn is_reusable(snapshot: &ClosestSnapshot, now: DateTime<Utc>) -> bool {
    if snapshot.status.as_deref() != Some("200") || !snapshot.available {
        return false;
    }
    snapshot
        .timestamp
        .as_deref()
        .and_then(parse_snapshot_timestamp)
        .is_some_and(|taken| taken > now - TimeDelta::hours(FRESHNESS_WINDOW_HOURS))
}

/// Parse a `YYYYMMDDhhmmss` snapshot timestamp as UTC.
pub fn parse_snapshot_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, SNAPSHOT_TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
