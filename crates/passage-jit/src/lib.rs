//! Just-in-time credential migration for the passage migration toolkit.
//!
//! At the user's first sign-in after cutover, the replacement tenant calls
//! out with the submitted password. This crate recovers the plaintext from
//! the doubly-wrapped token ([`PasswordContextDecryptor`]), checks it
//! against the legacy tenant ([`LegacyCredentialValidator`]) and against the
//! replacement tenant's complexity rules ([`PasswordPolicy`]), and decides
//! what the tenant should do ([`JitMigrationPipeline`]). The pipeline never
//! mutates directory state; it returns a decision and the caller applies
//! the effect.
//!
//! Everything here fails closed: any error at any stage becomes a block
//! decision with a safe, user-facing message, inside a hard latency budget.

mod context;
mod decrypt;
mod error;
pub mod keys;
mod pipeline;
mod policy;
mod validator;

pub use context::{JitMigrationResult, MigrationAction, PasswordContext};
pub use decrypt::{DecryptError, PasswordContextDecryptor};
pub use error::{JitError, JitResult};
pub use keys::PrivateKeyCache;
pub use pipeline::{JitMigrationPipeline, JitOptions, JitRequest};
pub use policy::{PasswordPolicy, PasswordValidation};
pub use validator::{AuthenticationOutcome, LegacyCredentialValidator, RopcCredentialValidator};
