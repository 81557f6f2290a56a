//! Migration status and the tracking extension attributes.

use serde::{Deserialize, Serialize};

/// Where a user stands in the migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MigrationStatus {
    /// Not touched yet.
    NotMigrated,
    /// Profile imported, password still pending just-in-time migration.
    ProfileImported,
    /// Profile and password both migrated.
    FullyMigrated,
    /// Migration failed for this user.
    Failed,
    /// Migration in progress.
    InProgress,
}

/// The well-known tracking attributes stamped onto imported users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingAttribute {
    /// Original object id in the legacy tenant.
    LegacyObjectId,
    /// Flag that triggers just-in-time migration at next sign-in.
    RequiresMigration,
    /// Timestamp of the profile import.
    MigratedAt,
}

impl TrackingAttribute {
    /// Bare attribute name, without the extension prefix.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::LegacyObjectId => "LegacyObjectId",
            Self::RequiresMigration => "RequiresMigration",
            Self::MigratedAt => "MigratedAt",
        }
    }

    /// Fully qualified attribute name for the given extensions app.
    #[must_use]
    pub fn qualified(&self, extension_app_id: &str) -> String {
        extension_attribute(extension_app_id, self.name())
    }
}

/// Formats a schema-extension attribute name.
///
/// The directory strips dashes from the extensions app id when it registers
/// attribute names, so `extension_{appIdWithoutDashes}_{Name}`.
#[must_use]
pub fn extension_attribute(extension_app_id: &str, name: &str) -> String {
    let app_id: String = extension_app_id.chars().filter(|c| *c != '-').collect();
    format!("extension_{app_id}_{name}")
}
