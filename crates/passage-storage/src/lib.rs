//! Object storage and message queue boundaries.
//!
//! Export blobs, audit records and profile-update messages flow through two
//! narrow interfaces: [`ObjectStore`] for JSON documents addressed by
//! container + name, and [`MessageQueue`] for typed profile-update messages.
//! The core treats both as dumb transports; the local implementations here
//! (filesystem store, in-memory queue) back development and tests, and a
//! cloud deployment swaps in its own implementations of the same traits.

mod object_store;
mod queue;

pub use object_store::{FsObjectStore, ObjectStore};
pub use queue::{InMemoryQueue, MessageQueue};

/// Errors returned by storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The named document or container does not exist.
    #[error("not found: {container}/{name}")]
    NotFound { container: String, name: String },

    /// A name contained characters the store cannot address safely.
    #[error("invalid name '{name}': {detail}")]
    InvalidName { name: String, detail: String },

    /// Deleting a message with an unknown or already-consumed receipt.
    #[error("unknown message receipt for message '{message_id}'")]
    UnknownReceipt { message_id: String },

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Validates a container or document name: path separators and parent
/// references are rejected so names cannot escape the store root.
pub(crate) fn validate_segment(name: &str) -> StorageResult<()> {
    let ok = !name.is_empty()
        && !name.contains(['/', '\\'])
        && name != "."
        && name != ".."
        && !name.starts_with('.');
    if ok {
        Ok(())
    } else {
        Err(StorageError::InvalidName {
            name: name.to_string(),
            detail: "names must be plain path segments".to_string(),
        })
    }
}
