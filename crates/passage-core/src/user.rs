//! User profile as the directory API shapes it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix the directory uses for schema-extension attributes.
const EXTENSION_PREFIX: &str = "extension_";

/// A user profile, the unit of migration.
///
/// Field names serialize to the camelCase property names the directory API
/// expects, so a profile can be read from an export blob and posted to the
/// replacement tenant without an intermediate wire type. Properties this
/// struct does not model explicitly (schema extensions included) are kept in
/// the flattened `additional` map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
    /// Object id assigned by the owning tenant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// User principal name, unique within a tenant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_principal_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mail: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub other_mails: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_phone: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_address: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    /// Whether the account is enabled. Defaults to true.
    #[serde(default = "default_account_enabled")]
    pub account_enabled: bool,

    /// Initial-password directive, present only when a password should be
    /// set at creation time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_profile: Option<PasswordProfile>,

    /// Sign-in identities (email, username, federated).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub identities: Vec<ObjectIdentity>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_date_time: Option<DateTime<Utc>>,

    /// Everything else, including `extension_{appId}_{Name}` attributes.
    #[serde(flatten)]
    pub additional: BTreeMap<String, serde_json::Value>,
}

fn default_account_enabled() -> bool {
    true
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            id: None,
            user_principal_name: None,
            display_name: None,
            given_name: None,
            surname: None,
            mail: None,
            other_mails: Vec::new(),
            mobile_phone: None,
            street_address: None,
            city: None,
            state: None,
            postal_code: None,
            country: None,
            account_enabled: true,
            password_profile: None,
            identities: Vec::new(),
            created_date_time: None,
            additional: BTreeMap::new(),
        }
    }
}

impl UserProfile {
    /// Returns the value of an additional/extension attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&serde_json::Value> {
        self.additional.get(name)
    }

    /// Sets an additional/extension attribute, replacing any prior value.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: serde_json::Value) {
        self.additional.insert(name.into(), value);
    }

    /// Iterates over schema-extension attributes only.
    pub fn extension_attributes(
        &self,
    ) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.additional
            .iter()
            .filter(|(k, _)| k.starts_with(EXTENSION_PREFIX))
    }

    /// Identifier used in batch accounting and audit records: the UPN when
    /// present, otherwise the object id, otherwise empty.
    #[must_use]
    pub fn identifier(&self) -> &str {
        self.user_principal_name
            .as_deref()
            .or(self.id.as_deref())
            .unwrap_or_default()
    }
}

/// Password directive attached to a user at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordProfile {
    pub password: String,
    /// Whether the user must change the password on next sign-in.
    #[serde(default)]
    pub force_change_password_next_sign_in: bool,
}

/// A sign-in identity associated with a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectIdentity {
    /// Sign-in type, e.g. "emailAddress", "userName" or "federated".
    pub sign_in_type: String,
    /// Issuer, e.g. the tenant domain or an external IdP.
    pub issuer: String,
    /// The identity value assigned by the issuer.
    pub issuer_assigned_id: String,
}
