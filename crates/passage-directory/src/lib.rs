//! Resilient directory-service access for the passage migration toolkit.
//!
//! Two pieces live here. [`CredentialPool`] rotates among multiple
//! app-registration credentials so bulk operations spread load across
//! rate-limit buckets, tracking per-credential throttle cooldowns.
//! [`DirectoryClient`] wraps the directory REST API (paginated list, single
//! and batch create, get, update, attribute search, password set) with
//! retry, exponential backoff, `Retry-After` handling and per-operation
//! timeouts, drawing a credential from the pool for every attempt and
//! reporting throttling back to it.
//!
//! One client is built per logical tenant connection via
//! [`DirectoryClient::for_tenant`]; instances are internally immutable and
//! safe to share across tasks.

mod client;
mod config;
mod credential_pool;
mod error;
mod retry;
mod token;

pub use client::DirectoryClient;
pub use config::{TenantEndpoints, TenantScope};
pub use credential_pool::{AppCredential, CredentialPool, PooledCredential};
pub use error::{DirectoryError, DirectoryResult};
pub use retry::RetryPolicy;
pub use token::TokenCache;
