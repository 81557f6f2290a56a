//! Run summary for export/import orchestrations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary of one orchestration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// Name of the operation, e.g. "export" or "import".
    pub operation: String,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Pages fetched or batches processed.
    pub batches: usize,
    /// Records handled across the run.
    pub total_records: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub skipped_count: usize,
}

impl RunSummary {
    #[must_use]
    pub fn started(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            started_at: Utc::now(),
            finished_at: None,
            batches: 0,
            total_records: 0,
            success_count: 0,
            failure_count: 0,
            skipped_count: 0,
        }
    }

    /// Marks the run finished now.
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Wall-clock duration, once finished.
    #[must_use]
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }
}
