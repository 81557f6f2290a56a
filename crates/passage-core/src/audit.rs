//! Per-batch import audit records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit record for one processed import batch.
///
/// Written once after the batch completes and never mutated; the import
/// orchestrator does not start the next batch until this record is durably
/// stored, which keeps the audit trail gap-free and the run resumable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportAuditLog {
    /// When the batch was processed.
    pub timestamp: DateTime<Utc>,
    /// Name of the export document the batch came from.
    pub source_name: String,
    /// 1-based batch number within the run.
    pub batch_number: usize,
    pub total_users: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub skipped_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub successful_users: Vec<ImportedUserRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_users: Vec<SkippedUserRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_users: Vec<FailedUserRecord>,
    /// Wall-clock duration of the batch in milliseconds.
    pub duration_ms: u64,
}

/// A user imported successfully.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedUserRecord {
    /// Object id in the legacy tenant.
    pub legacy_object_id: String,
    /// Object id assigned by the replacement tenant.
    pub new_object_id: String,
    pub user_principal_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub imported_at: DateTime<Utc>,
}

/// A user skipped because an identity already existed downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedUserRecord {
    pub legacy_object_id: String,
    pub user_principal_name: String,
    pub reason: String,
    pub skipped_at: DateTime<Utc>,
}

/// A user whose import failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedUserRecord {
    pub legacy_object_id: String,
    pub user_principal_name: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    pub failed_at: DateTime<Utc>,
}
