//! Error types for directory access.

use thiserror::Error;

/// Result type alias using [`DirectoryError`].
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Errors that can occur when talking to a directory tenant.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Configuration validation error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Token acquisition or authorization failure.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Error response from the directory API.
    #[error("directory API error ({status}): {code} - {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// A uniqueness constraint was violated downstream.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Rate limited and retries are exhausted.
    #[error("rate limited, retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    /// The operation exceeded its overall deadline.
    #[error("operation timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// The caller's cancellation signal fired.
    #[error("operation cancelled")]
    Cancelled,

    /// Credential lookup outside the configured pool.
    #[error("credential index {index} out of range (pool holds {count})")]
    CredentialOutOfRange { index: usize, count: usize },

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DirectoryError {
    /// Whether this error is a duplicate-identity conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
