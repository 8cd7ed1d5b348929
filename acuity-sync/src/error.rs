//! Sync error types.

use thiserror::Error;

/// Errors that can occur while talking to the assessment service.
#[derive(Debug, Error)]
pub enum SyncError {
    /// HTTP request failed.
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Response body was not valid JSON or had an unexpected shape.
    #[error("Failed to parse service response: {0}")]
    ParseError(String),

    /// Request timed out.
    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    /// Service unreachable.
    #[error("Assessment service unavailable: {0}")]
    Unavailable(String),

    /// Service answered with a non-success status.
    #[error("Service rejected the request: HTTP {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Raw response body, possibly empty.
        body: String,
    },
}

impl SyncError {
    /// Classify a transport error, attributing timeouts to the
    /// configured request deadline.
    #[must_use]
    pub fn from_reqwest(err: reqwest::Error, timeout_ms: u64) -> Self {
        if err.is_timeout() {
            SyncError::Timeout(timeout_ms)
        } else if err.is_connect() {
            SyncError::Unavailable(err.to_string())
        } else {
            SyncError::RequestFailed(err.to_string())
        }
    }
}
