//! Error types for the JIT migration crate.

use thiserror::Error;

/// Result type alias using [`JitError`].
pub type JitResult<T> = Result<T, JitError>;

/// Errors that can occur around the JIT pipeline.
///
/// These never reach the external caller directly; the pipeline and webhook
/// map every one of them to a block decision with a generic message.
#[derive(Debug, Error)]
pub enum JitError {
    /// Missing or invalid key material or options. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// The decryption key could not be obtained.
    #[error(transparent)]
    Secret(#[from] passage_secrets::SecretError),

    /// The legacy credential validator failed to produce an answer.
    #[error("legacy validator error: {0}")]
    Validator(String),

    /// HTTP transport error talking to the legacy tenant.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The caller's cancellation signal fired.
    #[error("operation cancelled")]
    Cancelled,
}
