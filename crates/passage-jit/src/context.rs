//! Pipeline inputs and outputs.

use serde::{Deserialize, Serialize};

/// Decrypted password context, alive only for one pipeline invocation.
///
/// Never persisted, never logged; `Debug` redacts the password.
#[derive(Clone)]
pub struct PasswordContext {
    pub password: String,
    /// Single-use nonce from the encrypted context, echoed back to the
    /// caller when present.
    pub nonce: Option<String>,
}

impl std::fmt::Debug for PasswordContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordContext")
            .field("password", &"[REDACTED]")
            .field("nonce", &self.nonce)
            .finish()
    }
}

/// Action verb returned to the invoking protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MigrationAction {
    /// Adopt the presented password in the replacement tenant and clear the
    /// migration-required flag.
    MigratePassword,
    /// Refuse the sign-in, with a user-facing title and message.
    Block,
    /// Force a password update.
    UpdatePassword,
    /// Ask the user to retry authentication.
    Retry,
}

/// Outcome of one JIT migration attempt.
#[derive(Debug, Clone)]
pub struct JitMigrationResult {
    pub action: MigrationAction,
    pub title: Option<String>,
    pub message: Option<String>,
    /// Set when the user turned out to be migrated already.
    pub already_migrated: bool,
}

impl JitMigrationResult {
    /// Success: the caller should migrate the password.
    #[must_use]
    pub fn migrate_password() -> Self {
        Self {
            action: MigrationAction::MigratePassword,
            title: None,
            message: None,
            already_migrated: false,
        }
    }

    /// Terminal block with a user-facing reason.
    #[must_use]
    pub fn blocked(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            action: MigrationAction::Block,
            title: Some(title.into()),
            message: Some(message.into()),
            already_migrated: false,
        }
    }

    /// Generic block used for any unexpected failure. Reveals nothing about
    /// what went wrong internally.
    #[must_use]
    pub fn system_error() -> Self {
        Self::blocked(
            "System Error",
            "An error occurred during authentication. Please try again later.",
        )
    }
}
