//! Profile mapping from the legacy tenant's shape to the replacement
//! tenant's.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use serde_json::Value;

use passage_core::{upn, ObjectIdentity, TrackingAttribute, UserProfile};

use crate::error::{ImportError, ImportResult};

/// Attribute renames and exclusions applied during import.
#[derive(Debug, Clone, Default)]
pub struct MappingRules {
    /// Source attribute name → target attribute name. Applies to extension
    /// and additional attributes.
    pub attribute_mappings: HashMap<String, String>,
    /// Wire property names never copied to the replacement tenant.
    pub exclude_fields: HashSet<String>,
}

/// Configuration for the migration-tracking extension attributes.
#[derive(Debug, Clone)]
pub struct TrackingAttributes {
    /// Extensions app id that owns the attributes in the replacement
    /// tenant.
    pub extension_app_id: String,
    pub store_legacy_object_id: bool,
    /// Override for the legacy-object-id attribute name.
    pub legacy_object_id_attribute: Option<String>,
    pub set_requires_migration: bool,
    /// Override for the requires-migration attribute name.
    pub requires_migration_attribute: Option<String>,
    /// Stamp an import timestamp onto each user.
    pub stamp_migrated_at: bool,
}

impl TrackingAttributes {
    #[must_use]
    pub fn new(extension_app_id: impl Into<String>) -> Self {
        Self {
            extension_app_id: extension_app_id.into(),
            store_legacy_object_id: true,
            legacy_object_id_attribute: None,
            set_requires_migration: true,
            requires_migration_attribute: None,
            stamp_migrated_at: false,
        }
    }

    /// Name of the attribute holding the legacy object id.
    #[must_use]
    pub fn legacy_object_id_attr(&self) -> String {
        self.legacy_object_id_attribute.clone().unwrap_or_else(|| {
            TrackingAttribute::LegacyObjectId.qualified(&self.extension_app_id)
        })
    }

    /// Name of the migration-required flag attribute.
    #[must_use]
    pub fn requires_migration_attr(&self) -> String {
        self.requires_migration_attribute.clone().unwrap_or_else(|| {
            TrackingAttribute::RequiresMigration.qualified(&self.extension_app_id)
        })
    }

    #[must_use]
    pub fn migrated_at_attr(&self) -> String {
        TrackingAttribute::MigratedAt.qualified(&self.extension_app_id)
    }
}

/// Maps legacy profiles into replacement-tenant creation payloads.
pub struct ProfileMapper {
    rules: MappingRules,
    tracking: TrackingAttributes,
    /// Domain of the replacement tenant, applied to the UPN and the
    /// email identity issuer.
    target_domain: String,
}

impl ProfileMapper {
    #[must_use]
    pub fn new(
        rules: MappingRules,
        tracking: TrackingAttributes,
        target_domain: impl Into<String>,
    ) -> Self {
        Self {
            rules,
            tracking,
            target_domain: target_domain.into(),
        }
    }

    /// Produces the profile to create in the replacement tenant.
    ///
    /// The source id never travels (the target assigns its own); it is
    /// preserved in the legacy-object-id tracking attribute instead.
    pub fn map(&self, source: &UserProfile) -> ImportResult<UserProfile> {
        let legacy_id = source
            .id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or(ImportError::MissingField("id"))?;
        let source_upn = source
            .user_principal_name
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or(ImportError::MissingField("userPrincipalName"))?;

        // Work on the wire shape so exclusions and renames address the
        // same property names the export carries.
        let mut value = serde_json::to_value(source)?;
        let Some(object) = value.as_object_mut() else {
            return Err(ImportError::MissingField("profile object"));
        };
        object.remove("id");
        object.remove("identities");
        for field in &self.rules.exclude_fields {
            object.remove(field);
        }
        for (from, to) in &self.rules.attribute_mappings {
            if let Some(v) = object.remove(from) {
                object.insert(to.clone(), v);
            }
        }

        let mut mapped: UserProfile = serde_json::from_value(value)?;

        mapped.user_principal_name = Some(upn::with_domain(source_upn, &self.target_domain));
        mapped.identities = self.build_identities(source);
        if let Some(ref mut password) = mapped.password_profile {
            password.force_change_password_next_sign_in = true;
        }

        if self.tracking.store_legacy_object_id {
            mapped.set_attribute(
                self.tracking.legacy_object_id_attr(),
                Value::String(legacy_id.to_string()),
            );
        }
        if self.tracking.set_requires_migration {
            mapped.set_attribute(self.tracking.requires_migration_attr(), Value::Bool(true));
        }
        if self.tracking.stamp_migrated_at {
            mapped.set_attribute(
                self.tracking.migrated_at_attr(),
                Value::String(Utc::now().to_rfc3339()),
            );
        }

        Ok(mapped)
    }

    /// The tracking attributes of an already-mapped profile, as a partial
    /// update for the overwrite-on-duplicate path.
    #[must_use]
    pub fn tracking_updates(&self, mapped: &UserProfile) -> serde_json::Map<String, Value> {
        let mut updates = serde_json::Map::new();
        for name in [
            self.tracking.legacy_object_id_attr(),
            self.tracking.requires_migration_attr(),
            self.tracking.migrated_at_attr(),
        ] {
            if let Some(v) = mapped.attribute(&name) {
                updates.insert(name, v.clone());
            }
        }
        updates
    }

    fn build_identities(&self, source: &UserProfile) -> Vec<ObjectIdentity> {
        let mut identities = Vec::new();

        // Password-based sign-in uses an email identity issued by the
        // replacement tenant.
        if let Some(mail) = source.mail.as_deref().filter(|m| !m.is_empty()) {
            identities.push(ObjectIdentity {
                sign_in_type: "emailAddress".to_string(),
                issuer: self.target_domain.clone(),
                issuer_assigned_id: mail.to_string(),
            });
        }

        // Federated identities keep their external issuer; local
        // email/username identities belong to the old tenant and are
        // rebuilt above.
        for identity in &source.identities {
            if identity.sign_in_type == "federated" {
                identities.push(identity.clone());
            }
        }

        identities
    }
}
