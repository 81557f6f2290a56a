//! Queue message for asynchronous profile sync.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which tenant a profile change originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpdateSource {
    Legacy,
    Replacement,
}

/// A profile change to be applied to the other tenant.
///
/// Emitted by a caller after a successful operation (an explicit message,
/// not untracked background work) and consumed by the profile sync worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdateMessage {
    /// Queue-assigned message id, absent until the message is received.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Receipt required to delete the message after processing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pop_receipt: Option<String>,
    pub source: UpdateSource,
    /// User id in the source tenant.
    pub user_id: String,
    /// User id in the target tenant, when already known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_user_id: Option<String>,
    /// Legacy object id used for correlation when the target id is unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_object_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_principal_name: Option<String>,
    /// Property names and new values to apply.
    pub updated_properties: BTreeMap<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl ProfileUpdateMessage {
    /// Creates a message for a change originating in the given tenant.
    #[must_use]
    pub fn new(
        source: UpdateSource,
        user_id: impl Into<String>,
        updated_properties: BTreeMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            message_id: None,
            pop_receipt: None,
            source,
            user_id: user_id.into(),
            target_user_id: None,
            legacy_object_id: None,
            user_principal_name: None,
            updated_properties,
            timestamp: Utc::now(),
            correlation_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_without_transport_fields() {
        let mut props = BTreeMap::new();
        props.insert("displayName".to_string(), json!("Jo"));
        let msg = ProfileUpdateMessage::new(UpdateSource::Legacy, "u-1", props);
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["source"], "legacy");
        assert_eq!(v["userId"], "u-1");
        assert!(v.get("messageId").is_none());
        assert!(v.get("popReceipt").is_none());
    }
}
