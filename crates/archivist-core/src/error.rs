use thiserror::Error;

/// Application-wide error types for Archivist.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request to the archive provider failed or returned a non-2xx status.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// The provider reported that the capture job itself failed.
    #[error("Capture job failed: {code}")]
    CaptureJob { code: String, retryable: bool },

    /// Polling did not reach a terminal state before the invocation deadline.
    #[error("Capture did not complete within {0} seconds")]
    DeadlineExceeded(u64),

    /// The entry referenced by an archive request does not exist.
    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    /// The entry exists but has no link at the requested index.
    #[error("Entry {entry_id} has no link at index {link_index}")]
    LinkNotFound { entry_id: String, link_index: usize },

    /// The link was edited after the task was queued and now points elsewhere.
    #[error("Link {link_index} of entry {entry_id} no longer points at the requested URL")]
    LinkChanged { entry_id: String, link_index: usize },

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true if redelivering the work that produced this error may succeed.
    ///
    /// Transport failures and unclassified errors default to retryable; only
    /// classified capture failures and references to entries that no longer
    /// exist are terminal.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::CaptureJob { retryable, .. } => *retryable,
            AppError::EntryNotFound(_)
            | AppError::LinkNotFound { .. }
            | AppError::LinkChanged { .. }
            | AppError::SerializationError(_)
            | AppError::ConfigError(_) => false,
            AppError::HttpError(_)
            | AppError::DeadlineExceeded(_)
            | AppError::Timeout(_)
            | AppError::RateLimitExceeded
            | AppError::NetworkError(_)
            | AppError::DatabaseError(_)
            | AppError::Generic(_) => true,
        }
    }
}
