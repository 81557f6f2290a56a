//! Error types for export/import orchestration.

use thiserror::Error;

/// Result type alias using [`ImportError`].
pub type ImportResult<T> = Result<T, ImportError>;

/// Errors that can occur during export or import runs.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Directory(#[from] passage_directory::DirectoryError),

    #[error(transparent)]
    Storage(#[from] passage_storage::StorageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A profile cannot be mapped because a required field is absent.
    #[error("profile missing required field: {0}")]
    MissingField(&'static str),

    /// Invalid orchestration options.
    #[error("configuration error: {0}")]
    Config(String),

    /// The caller's cancellation signal fired between batches.
    #[error("operation cancelled")]
    Cancelled,
}
