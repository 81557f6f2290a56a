//! Pluggable secret retrieval for the passage migration toolkit.
//!
//! The JIT pipeline needs exactly one secret at runtime (the RSA decryption
//! key) and the directory clients need app-registration client secrets at
//! startup. This crate abstracts where those come from: environment
//! variables for local runs, a mounted file tree for containerized
//! deployments. A TTL cache wraps any provider so hot-path lookups do not
//! hit the backing store.

pub mod cache;
pub mod provider;

use async_trait::async_trait;
use secrecy::SecretString;

pub use cache::CachedSecretProvider;
pub use provider::env::EnvSecretProvider;
pub use provider::file::FileSecretProvider;

/// Errors returned by secret provider operations.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    /// The named secret does not exist in the provider.
    #[error("secret not found: '{name}'")]
    NotFound { name: String },

    /// The provider could not be reached or read.
    #[error("secret provider '{provider}' unavailable: {detail}")]
    ProviderUnavailable { provider: String, detail: String },

    /// The secret exists but its value is unusable (empty, not UTF-8).
    #[error("invalid secret value for '{name}': {detail}")]
    InvalidValue { name: String, detail: String },

    /// The provider itself is misconfigured.
    #[error("secret provider configuration error: {detail}")]
    Config { detail: String },
}

/// Trait implemented by every secret backend.
///
/// Logical names use kebab-case (e.g. `jit-decryption-key`); each provider
/// maps them onto its own namespace. No retry contract is imposed here —
/// callers that need resilience wrap the provider in [`CachedSecretProvider`].
#[async_trait]
pub trait SecretProvider: Send + Sync {
    /// Resolves a secret by its logical name.
    async fn get_secret(&self, name: &str) -> Result<SecretString, SecretError>;

    /// Whether the provider is reachable and operational.
    async fn health_check(&self) -> Result<bool, SecretError>;

    /// Provider type name for logging.
    fn provider_type(&self) -> &'static str;
}

/// Validates a logical secret name: non-empty, lowercase alphanumeric with
/// dashes.
pub(crate) fn validate_name(name: &str) -> Result<(), SecretError> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if ok {
        Ok(())
    } else {
        Err(SecretError::InvalidValue {
            name: name.to_string(),
            detail: "secret names must be non-empty kebab-case".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_names() {
        assert!(validate_name("jit-decryption-key").is_ok());
        assert!(validate_name("key2").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("Bad_Name").is_err());
        assert!(validate_name("../escape").is_err());
    }

    #[test]
    fn error_display() {
        let err = SecretError::NotFound {
            name: "jit-decryption-key".into(),
        };
        assert_eq!(err.to_string(), "secret not found: 'jit-decryption-key'");
    }
}
