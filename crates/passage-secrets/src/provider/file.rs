//! File-tree secret provider.

use std::path::PathBuf;

use async_trait::async_trait;
use secrecy::SecretString;

use crate::{validate_name, SecretError, SecretProvider};

/// Resolves secrets from files under a root directory, one file per secret.
///
/// `jit-decryption-key` maps to `{root}/jit-decryption-key`. This matches
/// how orchestrators mount secrets as tmpfs file trees. Name validation
/// keeps lookups inside the root.
#[derive(Debug)]
pub struct FileSecretProvider {
    root: PathBuf,
}

impl FileSecretProvider {
    /// Creates a provider rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, SecretError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(SecretError::Config {
                detail: format!("secret root '{}' is not a directory", root.display()),
            });
        }
        Ok(Self { root })
    }
}

#[async_trait]
impl SecretProvider for FileSecretProvider {
    async fn get_secret(&self, name: &str) -> Result<SecretString, SecretError> {
        validate_name(name)?;
        let path = self.root.join(name);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                let trimmed = content.trim_end_matches(['\r', '\n']);
                if trimmed.is_empty() {
                    return Err(SecretError::InvalidValue {
                        name: name.to_string(),
                        detail: "secret file is empty".to_string(),
                    });
                }
                Ok(SecretString::new(trimmed.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(SecretError::NotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(SecretError::ProviderUnavailable {
                provider: "file".to_string(),
                detail: e.to_string(),
            }),
        }
    }

    async fn health_check(&self) -> Result<bool, SecretError> {
        Ok(self.root.is_dir())
    }

    fn provider_type(&self) -> &'static str {
        "file"
    }
}
