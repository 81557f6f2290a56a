//! Shared domain models for the passage migration toolkit.
//!
//! This crate holds the data types that cross crate boundaries during a
//! tenant-to-tenant identity migration: user profiles as the directory API
//! shapes them, paging and batch outcomes, per-batch audit records, and the
//! queue message used for asynchronous profile sync. It has no I/O of its
//! own.

mod audit;
mod batch;
mod message;
mod paging;
mod status;
mod summary;
pub mod upn;
mod user;

pub use audit::{FailedUserRecord, ImportAuditLog, ImportedUserRecord, SkippedUserRecord};
pub use batch::{BatchItemFailure, BatchResult};
pub use message::{ProfileUpdateMessage, UpdateSource};
pub use paging::PagedResult;
pub use status::{extension_attribute, MigrationStatus, TrackingAttribute};
pub use summary::RunSummary;
pub use user::{ObjectIdentity, PasswordProfile, UserProfile};
