//! Environment-variable secret provider.

use async_trait::async_trait;
use secrecy::SecretString;

use crate::{validate_name, SecretError, SecretProvider};

/// Resolves secrets from environment variables.
///
/// A logical name like `jit-decryption-key` maps to
/// `{PREFIX}_JIT_DECRYPTION_KEY`. Intended for local development and CI;
/// production deployments should mount secrets as files instead.
pub struct EnvSecretProvider {
    prefix: String,
}

impl EnvSecretProvider {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn var_name(&self, name: &str) -> String {
        let suffix: String = name
            .chars()
            .map(|c| match c {
                '-' => '_',
                c => c.to_ascii_uppercase(),
            })
            .collect();
        format!("{}_{}", self.prefix, suffix)
    }
}

impl Default for EnvSecretProvider {
    fn default() -> Self {
        Self::new("PASSAGE_SECRET")
    }
}

#[async_trait]
impl SecretProvider for EnvSecretProvider {
    async fn get_secret(&self, name: &str) -> Result<SecretString, SecretError> {
        validate_name(name)?;
        let var = self.var_name(name);
        match std::env::var(&var) {
            Ok(value) if !value.is_empty() => Ok(SecretString::new(value)),
            Ok(_) => Err(SecretError::InvalidValue {
                name: name.to_string(),
                detail: format!("environment variable {var} is empty"),
            }),
            Err(_) => Err(SecretError::NotFound {
                name: name.to_string(),
            }),
        }
    }

    async fn health_check(&self) -> Result<bool, SecretError> {
        Ok(true)
    }

    fn provider_type(&self) -> &'static str {
        "env"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[tokio::test]
    async fn resolves_from_environment() {
        std::env::set_var("PASSAGE_SECRET_TEST_ENV_KEY", "hunter2");
        let provider = EnvSecretProvider::default();
        let secret = provider.get_secret("test-env-key").await.unwrap();
        assert_eq!(secret.expose_secret(), "hunter2");
        std::env::remove_var("PASSAGE_SECRET_TEST_ENV_KEY");
    }

    #[tokio::test]
    async fn missing_variable_is_not_found() {
        let provider = EnvSecretProvider::default();
        let err = provider.get_secret("definitely-missing").await.unwrap_err();
        assert!(matches!(err, SecretError::NotFound { .. }));
    }

    #[test]
    fn maps_names_to_variables() {
        let provider = EnvSecretProvider::new("APP_SECRET");
        assert_eq!(
            provider.var_name("jit-decryption-key"),
            "APP_SECRET_JIT_DECRYPTION_KEY"
        );
    }
}
