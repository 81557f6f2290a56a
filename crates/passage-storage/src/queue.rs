//! Profile-update message queue.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use passage_core::ProfileUpdateMessage;

use crate::{StorageError, StorageResult};

/// Queue of typed profile-update messages.
///
/// Receive hands back messages stamped with a message id and a pop receipt;
/// a message is only gone once it is deleted with that receipt, so a worker
/// that dies mid-apply leaves the message claimable again.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Enqueues a message.
    async fn send(&self, queue: &str, message: &ProfileUpdateMessage) -> StorageResult<()>;

    /// Receives up to `max_messages` messages, marking them in flight.
    async fn receive(
        &self,
        queue: &str,
        max_messages: usize,
    ) -> StorageResult<Vec<ProfileUpdateMessage>>;

    /// Deletes a received message after successful processing.
    async fn delete(&self, queue: &str, message_id: &str, pop_receipt: &str) -> StorageResult<()>;

    /// Creates the queue if it does not already exist.
    async fn ensure_queue(&self, queue: &str) -> StorageResult<()>;
}

#[derive(Default)]
struct QueueState {
    ready: VecDeque<ProfileUpdateMessage>,
    /// message id → (pop receipt, message)
    in_flight: HashMap<String, (String, ProfileUpdateMessage)>,
}

/// In-memory queue for development and tests.
#[derive(Default)]
pub struct InMemoryQueue {
    queues: Mutex<HashMap<String, QueueState>>,
}

impl InMemoryQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages currently ready (not in flight).
    pub async fn ready_len(&self, queue: &str) -> usize {
        let queues = self.queues.lock().await;
        queues.get(queue).map_or(0, |q| q.ready.len())
    }
}

#[async_trait]
impl MessageQueue for InMemoryQueue {
    async fn send(&self, queue: &str, message: &ProfileUpdateMessage) -> StorageResult<()> {
        let mut queues = self.queues.lock().await;
        let state = queues.entry(queue.to_string()).or_default();
        let mut stored = message.clone();
        stored.message_id = Some(Uuid::new_v4().to_string());
        stored.pop_receipt = None;
        state.ready.push_back(stored);
        Ok(())
    }

    async fn receive(
        &self,
        queue: &str,
        max_messages: usize,
    ) -> StorageResult<Vec<ProfileUpdateMessage>> {
        let mut queues = self.queues.lock().await;
        let state = queues.entry(queue.to_string()).or_default();
        let mut received = Vec::new();
        while received.len() < max_messages {
            let Some(mut message) = state.ready.pop_front() else {
                break;
            };
            let receipt = Uuid::new_v4().to_string();
            message.pop_receipt = Some(receipt.clone());
            let id = message
                .message_id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            state.in_flight.insert(id, (receipt, message.clone()));
            received.push(message);
        }
        Ok(received)
    }

    async fn delete(&self, queue: &str, message_id: &str, pop_receipt: &str) -> StorageResult<()> {
        let mut queues = self.queues.lock().await;
        let state = queues.entry(queue.to_string()).or_default();
        match state.in_flight.get(message_id) {
            Some((receipt, _)) if receipt == pop_receipt => {
                state.in_flight.remove(message_id);
                Ok(())
            }
            _ => Err(StorageError::UnknownReceipt {
                message_id: message_id.to_string(),
            }),
        }
    }

    async fn ensure_queue(&self, queue: &str) -> StorageResult<()> {
        let mut queues = self.queues.lock().await;
        queues.entry(queue.to_string()).or_default();
        Ok(())
    }
}
