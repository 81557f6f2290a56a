//! Orchestration options.

use std::time::Duration;

/// What to do when a submitted user already exists downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateHandling {
    /// Record the user as skipped and move on (default).
    Skip,
    /// Additionally rewrite the migration-tracking extension attributes on
    /// the existing user. Other profile fields are never touched.
    OverwriteTracking,
}

/// Options for the batch import orchestrator.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Users per directory batch (default: 100).
    pub batch_size: usize,
    /// Deliberate pause between batches to throttle downstream load.
    pub batch_delay: Option<Duration>,
    pub on_duplicate: DuplicateHandling,
    /// Container holding export documents.
    pub export_container: String,
    /// Container audit records are written to.
    pub audit_container: String,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            batch_size: 100,
            batch_delay: None,
            on_duplicate: DuplicateHandling::Skip,
            export_container: "exports".to_string(),
            audit_container: "import-audit".to_string(),
        }
    }
}

impl ImportOptions {
    pub fn validate(&self) -> Result<(), String> {
        if self.batch_size == 0 {
            return Err("batch_size must be >= 1".to_string());
        }
        Ok(())
    }
}

/// Options for the export orchestrator.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Container export documents are written to.
    pub container: String,
    /// Users per directory page (default: 100).
    pub page_size: usize,
    /// Optional property selection passed to the directory.
    pub select: Option<String>,
    /// Optional filter expression passed to the directory.
    pub filter: Option<String>,
    /// Prefix for export document names.
    pub document_prefix: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            container: "exports".to_string(),
            page_size: 100,
            select: None,
            filter: None,
            document_prefix: "export".to_string(),
        }
    }
}

impl ExportOptions {
    pub fn validate(&self) -> Result<(), String> {
        if self.page_size == 0 {
            return Err("page_size must be >= 1".to_string());
        }
        Ok(())
    }
}
