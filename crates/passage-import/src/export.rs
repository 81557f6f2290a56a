//! Paged export of the legacy tenant into the object store.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use passage_core::RunSummary;
use passage_directory::DirectoryClient;
use passage_storage::ObjectStore;

use crate::error::{ImportError, ImportResult};
use crate::options::ExportOptions;

/// Drains the legacy tenant page by page into export documents.
///
/// Each directory page becomes one JSON document, so an interrupted export
/// can resume from the last written page and the import side can replay
/// documents in order.
pub struct ExportOrchestrator {
    directory: Arc<DirectoryClient>,
    store: Arc<dyn ObjectStore>,
    options: ExportOptions,
}

impl ExportOrchestrator {
    pub fn new(
        directory: Arc<DirectoryClient>,
        store: Arc<dyn ObjectStore>,
        options: ExportOptions,
    ) -> ImportResult<Self> {
        options.validate().map_err(ImportError::Config)?;
        Ok(Self {
            directory,
            store,
            options,
        })
    }

    /// Exports every user the filter matches.
    #[instrument(skip(self, cancel))]
    pub async fn run(&self, cancel: &CancellationToken) -> ImportResult<RunSummary> {
        let mut summary = RunSummary::started("export");
        self.store
            .ensure_container(&self.options.container)
            .await?;

        let mut token: Option<String> = None;
        let mut page_number = 0usize;
        loop {
            if cancel.is_cancelled() {
                return Err(ImportError::Cancelled);
            }

            let page = self
                .directory
                .list_users(
                    self.options.page_size,
                    self.options.select.as_deref(),
                    self.options.filter.as_deref(),
                    token.as_deref(),
                    cancel,
                )
                .await?;

            if !page.is_empty() {
                page_number += 1;
                let document = format!(
                    "{}-page-{:04}.json",
                    self.options.document_prefix, page_number
                );
                self.store
                    .put(
                        &self.options.container,
                        &document,
                        &serde_json::to_string_pretty(&page.items)?,
                    )
                    .await?;
                summary.batches += 1;
                summary.total_records += page.len();
                summary.success_count += page.len();
                info!(document, users = page.len(), "export page written");
            }

            if !page.has_more() {
                break;
            }
            token = page.next_page_token;
        }

        summary.finish();
        info!(
            pages = summary.batches,
            users = summary.total_records,
            "export run finished"
        );
        Ok(summary)
    }
}
