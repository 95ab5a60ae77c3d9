use std::fmt;
use std::time::Duration;

use archivist_core::config::positive_env;
use archivist_core::error::AppError;

pub const DEFAULT_SAVE_URL: &str = "https://web.archive.org/save";
pub const DEFAULT_AVAILABILITY_URL: &str = "https://archive.org/wayback/available";
const DEFAULT_JS_BEHAVIOR_TIMEOUT: u64 = 10;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Wayback Machine endpoints and credentials.
#[derive(Clone)]
pub struct WaybackConfig {
    pub access_key: String,
    pub secret_key: String,
    pub save_url: String,
    pub availability_url: String,
    /// Seconds the capture browser runs page scripts before snapshotting.
    pub js_behavior_timeout: u64,
    pub request_timeout: Duration,
}

impl fmt::Debug for WaybackConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaybackConfig")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("save_url", &self.save_url)
            .field("availability_url", &self.availability_url)
            .field("js_behavior_timeout", &self.js_behavior_timeout)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl WaybackConfig {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            save_url: DEFAULT_SAVE_URL.to_string(),
            availability_url: DEFAULT_AVAILABILITY_URL.to_string(),
            js_behavior_timeout: DEFAULT_JS_BEHAVIOR_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Build from `WAYBACK_*` environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        let access_key = required_env("WAYBACK_ACCESS_KEY")?;
        let secret_key = required_env("WAYBACK_SECRET_KEY")?;

        let mut config = Self::new(access_key, secret_key);
        if let Ok(url) = std::env::var("WAYBACK_SAVE_URL") {
            config.save_url = url;
        }
        if let Ok(url) = std::env::var("WAYBACK_AVAILABILITY_URL") {
            config.availability_url = url;
        }
        config.js_behavior_timeout =
            positive_env("WAYBACK_JS_BEHAVIOR_TIMEOUT", DEFAULT_JS_BEHAVIOR_TIMEOUT)?;
        Ok(config)
    }

    /// Point both endpoints at `base` (a mock server in tests).
    pub fn with_base_url(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.save_url = format!("{base}/save");
        self.availability_url = format!("{base}/wayback/available");
        self
    }

    /// Value of the `Authorization` header for authenticated endpoints.
    pub fn authorization(&self) -> String {
        format!("LOW {}:{}", self.access_key, self.secret_key)
    }
}

fn required_env(name: &str) -> Result<String, AppError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::ConfigError(format!("{name} must be set")))
}
