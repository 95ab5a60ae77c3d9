use std::time::Duration;

use crate::error::AppError;

pub const DEFAULT_WEB_BASE: &str = "https://web.archive.org";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
/// Capture latency is highly variable; one invocation gets five minutes.
const DEFAULT_DEADLINE_SECS: u64 = 300;
const DEFAULT_MAX_STATUS_FAILURES: u32 = 3;

/// Tuning for one archive invocation.
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    /// Sleep between status queries while a capture is pending.
    pub poll_interval: Duration,
    /// Total budget for one invocation, from lookup to final status.
    pub deadline: Duration,
    /// Consecutive status-query transport failures tolerated before giving up.
    pub max_status_failures: u32,
    /// Base of composed archive URLs: `{web_base}/web/{timestamp}/{url}`.
    pub web_base: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            deadline: Duration::from_secs(DEFAULT_DEADLINE_SECS),
            max_status_failures: DEFAULT_MAX_STATUS_FAILURES,
            web_base: DEFAULT_WEB_BASE.to_string(),
        }
    }
}

impl ArchiveConfig {
    /// Read configuration from environment variables.
    ///
    /// - `ARCHIVIST_POLL_INTERVAL_SECS` (optional, defaults to 5)
    /// - `ARCHIVIST_DEADLINE_SECS` (optional, defaults to 300)
    /// - `ARCHIVIST_MAX_STATUS_FAILURES` (optional, defaults to 3)
    /// - `WAYBACK_WEB_BASE` (optional, defaults to `https://web.archive.org`)
    pub fn from_env() -> Result<Self, AppError> {
        let poll_interval = Duration::from_secs(positive_env(
            "ARCHIVIST_POLL_INTERVAL_SECS",
            DEFAULT_POLL_INTERVAL_SECS,
        )?);
        let deadline =
            Duration::from_secs(positive_env("ARCHIVIST_DEADLINE_SECS", DEFAULT_DEADLINE_SECS)?);
        let max_status_failures =
            positive_env_u32("ARCHIVIST_MAX_STATUS_FAILURES", DEFAULT_MAX_STATUS_FAILURES)?;
        let web_base = std::env::var("WAYBACK_WEB_BASE")
            .unwrap_or_else(|_| DEFAULT_WEB_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            poll_interval,
            deadline,
            max_status_failures,
            web_base,
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_web_base(mut self, base: impl Into<String>) -> Self {
        self.web_base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// Compose the public archive URL for a completed capture.
    pub fn archive_url(&self, timestamp: &str, url: &str) -> String {
        format!("{}/web/{timestamp}/{url}", self.web_base)
    }
}

/// Parse an optional positive integer environment variable.
pub fn positive_env(name: &str, default: u64) -> Result<u64, AppError> {
    match std::env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => {
            let parsed: u64 = raw.trim().parse().map_err(|_| {
                AppError::ConfigError(format!(
                    "Invalid {name} '{raw}': must be a positive integer"
                ))
            })?;
            if parsed == 0 {
                return Err(AppError::ConfigError(format!("{name} must be at least 1")));
            }
            Ok(parsed)
        }
    }
}

/// [`positive_env`] for settings stored as `u32`. Values past `u32::MAX` are
/// rejected instead of wrapping.
pub fn positive_env_u32(name: &str, default: u32) -> Result<u32, AppError> {
    narrow_u32(name, positive_env(name, u64::from(default))?)
}

fn narrow_u32(name: &str, value: u64) -> Result<u32, AppError> {
    u32::try_from(value)
        .map_err(|_| AppError::ConfigError(format!("{name} must be at most {}", u32::MAX)))
}
