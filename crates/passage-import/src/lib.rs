//! Bulk profile movement between tenants.
//!
//! [`ExportOrchestrator`] drains the legacy tenant page by page into export
//! documents. [`BatchImportOrchestrator`] replays those documents into the
//! replacement tenant: remap attributes, stamp migration-tracking
//! extensions, create users in fixed-size batches, and write one audit
//! record per batch before the next batch starts. [`ProfileSyncWorker`]
//! applies queued profile updates that arrive while the migration window is
//! open.

mod error;
mod export;
mod mapper;
mod options;
mod orchestrator;
mod sync;

pub use error::{ImportError, ImportResult};
pub use export::ExportOrchestrator;
pub use mapper::{MappingRules, ProfileMapper, TrackingAttributes};
pub use options::{DuplicateHandling, ExportOptions, ImportOptions};
pub use orchestrator::BatchImportOrchestrator;
pub use sync::ProfileSyncWorker;
