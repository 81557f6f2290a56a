//! Sequential batch import with per-batch audit records.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use passage_core::{
    FailedUserRecord, ImportAuditLog, ImportedUserRecord, RunSummary, SkippedUserRecord,
    UserProfile,
};
use passage_directory::DirectoryClient;
use passage_storage::ObjectStore;

use crate::error::{ImportError, ImportResult};
use crate::mapper::ProfileMapper;
use crate::options::{DuplicateHandling, ImportOptions};

/// Fallback wait when a throttled batch carries no retry hint.
const DEFAULT_THROTTLE_WAIT: Duration = Duration::from_secs(30);

/// Replays an export document into the replacement tenant.
///
/// Batches are strictly sequential: a batch's audit record is durably
/// written before the next batch starts, so the audit trail has no gaps
/// and an interrupted run can be resumed from the last record.
pub struct BatchImportOrchestrator {
    directory: Arc<DirectoryClient>,
    store: Arc<dyn ObjectStore>,
    mapper: ProfileMapper,
    options: ImportOptions,
}

impl BatchImportOrchestrator {
    pub fn new(
        directory: Arc<DirectoryClient>,
        store: Arc<dyn ObjectStore>,
        mapper: ProfileMapper,
        options: ImportOptions,
    ) -> ImportResult<Self> {
        options.validate().map_err(ImportError::Config)?;
        Ok(Self {
            directory,
            store,
            mapper,
            options,
        })
    }

    /// Imports every profile in the named export document.
    #[instrument(skip(self, cancel), fields(source = source_name))]
    pub async fn run(
        &self,
        source_name: &str,
        cancel: &CancellationToken,
    ) -> ImportResult<RunSummary> {
        let body = self
            .store
            .get(&self.options.export_container, source_name)
            .await?;
        let profiles: Vec<UserProfile> = serde_json::from_str(&body)?;

        let mut summary = RunSummary::started("import");
        summary.total_records = profiles.len();
        self.store
            .ensure_container(&self.options.audit_container)
            .await?;

        let batches: Vec<&[UserProfile]> = profiles.chunks(self.options.batch_size).collect();
        let batch_count = batches.len();
        info!(
            total = profiles.len(),
            batch_count,
            batch_size = self.options.batch_size,
            "import run starting"
        );

        for (i, batch) in batches.into_iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(ImportError::Cancelled);
            }
            let batch_number = i + 1;
            let audit = self
                .process_batch(source_name, batch_number, batch, cancel)
                .await?;

            summary.batches += 1;
            summary.success_count += audit.success_count;
            summary.failure_count += audit.failure_count;
            summary.skipped_count += audit.skipped_count;

            if batch_number < batch_count {
                if let Some(delay) = self.options.batch_delay {
                    tokio::select! {
                        () = cancel.cancelled() => return Err(ImportError::Cancelled),
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        summary.finish();
        info!(
            batches = summary.batches,
            success = summary.success_count,
            skipped = summary.skipped_count,
            failed = summary.failure_count,
            "import run finished"
        );
        Ok(summary)
    }

    async fn process_batch(
        &self,
        source_name: &str,
        batch_number: usize,
        batch: &[UserProfile],
        cancel: &CancellationToken,
    ) -> ImportResult<ImportAuditLog> {
        let started = Instant::now();

        // Map first; a profile that cannot be mapped is a per-item failure,
        // not a run failure.
        let mut mapped = Vec::new();
        let mut sources = Vec::new();
        let mut failed_users = Vec::new();
        for source in batch {
            match self.mapper.map(source) {
                Ok(profile) => {
                    sources.push(source);
                    mapped.push(profile);
                }
                Err(e) => failed_users.push(FailedUserRecord {
                    legacy_object_id: source.id.clone().unwrap_or_default(),
                    user_principal_name: source.identifier().to_string(),
                    message: e.to_string(),
                    status_code: None,
                    failed_at: Utc::now(),
                }),
            }
        }

        // Submit, pacing on whole-batch throttles until the service takes
        // the batch.
        let result = loop {
            let result = self.directory.create_users_batch(&mapped, cancel).await?;
            if !result.was_throttled {
                break result;
            }
            let wait = result.retry_after.unwrap_or(DEFAULT_THROTTLE_WAIT);
            warn!(
                batch_number,
                wait_secs = wait.as_secs(),
                "batch throttled, waiting before resubmitting"
            );
            tokio::select! {
                () = cancel.cancelled() => return Err(ImportError::Cancelled),
                () = tokio::time::sleep(wait) => {}
            }
        };

        if self.options.on_duplicate == DuplicateHandling::OverwriteTracking {
            for duplicate in &result.duplicate_users {
                if let Err(e) = self.overwrite_tracking(duplicate, cancel).await {
                    warn!(
                        user = duplicate.identifier(),
                        error = %e,
                        "tracking-attribute overwrite failed"
                    );
                }
            }
        }

        // Correlate outcomes back to legacy identities by the mapped UPN.
        let source_by_upn: HashMap<&str, &UserProfile> = mapped
            .iter()
            .zip(sources.iter())
            .filter_map(|(m, s)| m.user_principal_name.as_deref().map(|upn| (upn, *s)))
            .collect();
        let legacy_id_of = |upn: &str| -> String {
            source_by_upn
                .get(upn)
                .and_then(|s| s.id.clone())
                .unwrap_or_default()
        };

        let successful_users = result
            .created_users
            .iter()
            .map(|created| {
                let upn = created.identifier().to_string();
                ImportedUserRecord {
                    legacy_object_id: legacy_id_of(&upn),
                    new_object_id: created.id.clone().unwrap_or_default(),
                    user_principal_name: upn,
                    display_name: created.display_name.clone(),
                    imported_at: Utc::now(),
                }
            })
            .collect();

        let skipped_users = result
            .skipped_user_ids
            .iter()
            .map(|upn| SkippedUserRecord {
                legacy_object_id: legacy_id_of(upn),
                user_principal_name: upn.clone(),
                reason: "duplicate - user already exists".to_string(),
                skipped_at: Utc::now(),
            })
            .collect();

        for failure in &result.failures {
            let upn = failure.item_id.clone();
            failed_users.push(FailedUserRecord {
                legacy_object_id: legacy_id_of(&upn),
                user_principal_name: upn,
                message: failure.message.clone(),
                status_code: failure.status_code,
                failed_at: Utc::now(),
            });
        }

        let audit = ImportAuditLog {
            timestamp: Utc::now(),
            source_name: source_name.to_string(),
            batch_number,
            total_users: batch.len(),
            success_count: result.success_count,
            failure_count: failed_users.len(),
            skipped_count: result.skipped_count,
            successful_users,
            skipped_users,
            failed_users,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        // The audit record must be durable before the next batch starts.
        let document = format!(
            "{}-batch-{:04}.json",
            source_name.trim_end_matches(".json"),
            batch_number
        );
        self.store
            .put(
                &self.options.audit_container,
                &document,
                &serde_json::to_string_pretty(&audit)?,
            )
            .await?;

        info!(
            batch_number,
            total = audit.total_users,
            success = audit.success_count,
            skipped = audit.skipped_count,
            failed = audit.failure_count,
            duration_ms = audit.duration_ms,
            "batch audited"
        );
        Ok(audit)
    }

    /// Rewrites the tracking attributes on the existing downstream user
    /// that shadowed a submitted duplicate.
    async fn overwrite_tracking(
        &self,
        submitted: &UserProfile,
        cancel: &CancellationToken,
    ) -> ImportResult<()> {
        let Some(upn) = submitted.user_principal_name.as_deref() else {
            return Ok(());
        };
        let filter = format!("userPrincipalName eq '{}'", upn.replace('\'', "''"));
        let page = self
            .directory
            .list_users(1, Some("id,userPrincipalName"), Some(&filter), None, cancel)
            .await?;
        let Some(existing_id) = page.items.first().and_then(|u| u.id.clone()) else {
            warn!(upn, "duplicate reported but existing user not found");
            return Ok(());
        };

        let updates = self.mapper.tracking_updates(submitted);
        if updates.is_empty() {
            return Ok(());
        }
        self.directory
            .update_user(&existing_id, &updates, cancel)
            .await?;
        info!(upn, existing_id, "tracking attributes overwritten");
        Ok(())
    }
}
