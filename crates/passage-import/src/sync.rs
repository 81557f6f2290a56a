//! Queue-driven profile sync during the migration window.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use passage_core::ProfileUpdateMessage;
use passage_directory::DirectoryClient;
use passage_storage::MessageQueue;

use crate::error::{ImportError, ImportResult};

/// Applies queued profile updates to the target tenant.
///
/// Messages are deleted only after the update has been applied, so a crash
/// mid-apply leaves the message claimable for the next drain.
pub struct ProfileSyncWorker {
    queue: Arc<dyn MessageQueue>,
    directory: Arc<DirectoryClient>,
    queue_name: String,
    /// Extension attribute used to resolve a target user from a legacy
    /// object id when the message carries no target id.
    legacy_id_attribute: String,
}

impl ProfileSyncWorker {
    #[must_use]
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        directory: Arc<DirectoryClient>,
        queue_name: impl Into<String>,
        legacy_id_attribute: impl Into<String>,
    ) -> Self {
        Self {
            queue,
            directory,
            queue_name: queue_name.into(),
            legacy_id_attribute: legacy_id_attribute.into(),
        }
    }

    /// Receives up to `max_messages` updates and applies them. Returns how
    /// many were applied.
    #[instrument(skip(self, cancel), fields(queue = %self.queue_name))]
    pub async fn drain(
        &self,
        max_messages: usize,
        cancel: &CancellationToken,
    ) -> ImportResult<usize> {
        let messages = self.queue.receive(&self.queue_name, max_messages).await?;
        let mut applied = 0usize;

        for message in messages {
            if cancel.is_cancelled() {
                return Err(ImportError::Cancelled);
            }
            match self.apply(&message, cancel).await {
                Ok(resolved) => {
                    if resolved {
                        applied += 1;
                    } else {
                        warn!(
                            user_id = %message.user_id,
                            "profile update target not found, dropping message"
                        );
                    }
                    self.delete(&message).await?;
                }
                Err(e) => {
                    // Leave the message in flight; it becomes claimable on
                    // the next drain.
                    warn!(
                        user_id = %message.user_id,
                        error = %e,
                        "profile update failed, message left for redelivery"
                    );
                }
            }
        }

        info!(applied, "queue drain complete");
        Ok(applied)
    }

    async fn apply(
        &self,
        message: &ProfileUpdateMessage,
        cancel: &CancellationToken,
    ) -> ImportResult<bool> {
        let target_id = match &message.target_user_id {
            Some(id) => Some(id.clone()),
            None => match &message.legacy_object_id {
                Some(legacy_id) => self
                    .directory
                    .find_user_by_extension_attribute(&self.legacy_id_attribute, legacy_id, cancel)
                    .await?
                    .and_then(|user| user.id),
                None => None,
            },
        };
        let Some(target_id) = target_id else {
            return Ok(false);
        };

        let updates: serde_json::Map<String, serde_json::Value> = message
            .updated_properties
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if updates.is_empty() {
            return Ok(true);
        }

        self.directory
            .update_user(&target_id, &updates, cancel)
            .await?;
        Ok(true)
    }

    async fn delete(&self, message: &ProfileUpdateMessage) -> ImportResult<()> {
        if let (Some(id), Some(receipt)) = (&message.message_id, &message.pop_receipt) {
            self.queue.delete(&self.queue_name, id, receipt).await?;
        }
        Ok(())
    }
}
