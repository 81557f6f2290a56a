//! Outcomes of bulk directory operations.

use std::time::Duration;

use crate::user::UserProfile;

/// Result of a bulk user create.
///
/// Item outcomes are independent: one item failing never aborts the others.
/// Duplicates (a pre-existing identity match downstream) are recorded as
/// skipped, not failed. Invariant: `success_count + failure_count +
/// skipped_count <= total_items`; the counts fall short of the total only
/// when the whole batch was throttled before any item was attempted.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub total_items: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub skipped_count: usize,
    /// Per-item failure details.
    pub failures: Vec<BatchItemFailure>,
    /// Identifiers of skipped (duplicate) users.
    pub skipped_user_ids: Vec<String>,
    /// The submitted profiles that turned out to be duplicates, retained so
    /// a caller can overwrite tracking attributes on the existing users.
    pub duplicate_users: Vec<UserProfile>,
    /// Profiles as created downstream, carrying the ids the replacement
    /// tenant assigned.
    pub created_users: Vec<UserProfile>,
    /// Whether the batch as a whole was rejected by rate limiting.
    pub was_throttled: bool,
    /// Suggested wait before resubmitting, when throttled.
    pub retry_after: Option<Duration>,
}

impl BatchResult {
    /// A result for a batch that was never attempted because the service
    /// throttled the whole submission.
    #[must_use]
    pub fn throttled(total_items: usize, retry_after: Option<Duration>) -> Self {
        Self {
            total_items,
            was_throttled: true,
            retry_after,
            ..Default::default()
        }
    }

    /// Whether every item succeeded.
    #[must_use]
    pub fn is_fully_successful(&self) -> bool {
        !self.was_throttled && self.failure_count == 0
    }
}

/// A single item failure within a batch.
#[derive(Debug, Clone)]
pub struct BatchItemFailure {
    /// Position of the item in the submitted batch.
    pub index: usize,
    /// Identifier of the item, usually the UPN.
    pub item_id: String,
    pub message: String,
    /// HTTP status of the item response, when one was received.
    pub status_code: Option<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttled_result_has_zero_counts() {
        let r = BatchResult::throttled(10, Some(Duration::from_secs(30)));
        assert!(r.was_throttled);
        assert_eq!(r.total_items, 10);
        assert_eq!(r.success_count + r.failure_count + r.skipped_count, 0);
        assert!(!r.is_fully_successful());
    }

    #[test]
    fn fully_successful_requires_no_failures() {
        let r = BatchResult {
            total_items: 3,
            success_count: 2,
            skipped_count: 1,
            ..Default::default()
        };
        assert!(r.is_fully_successful());
    }
}
