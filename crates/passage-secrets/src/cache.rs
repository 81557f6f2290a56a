//! TTL cache over any secret provider.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use secrecy::SecretString;
use tokio::sync::RwLock;

use crate::{SecretError, SecretProvider};

struct CachedEntry {
    value: SecretString,
    expires_at: DateTime<Utc>,
}

/// Wraps a provider with per-entry TTL caching.
///
/// On a provider failure the cache falls back to a stale entry when one
/// exists, so a brief backing-store outage does not take down the sign-in
/// path.
pub struct CachedSecretProvider {
    inner: Arc<dyn SecretProvider>,
    entries: RwLock<HashMap<String, CachedEntry>>,
    ttl: Duration,
}

impl CachedSecretProvider {
    /// Wraps `inner` with the given TTL in seconds.
    #[must_use]
    pub fn new(inner: Arc<dyn SecretProvider>, ttl_seconds: u64) -> Self {
        Self {
            inner,
            entries: RwLock::new(HashMap::new()),
            ttl: Duration::seconds(ttl_seconds as i64),
        }
    }

    /// Drops a cached entry, forcing the next lookup through to the provider.
    pub async fn invalidate(&self, name: &str) {
        self.entries.write().await.remove(name);
    }

    async fn fresh(&self, name: &str) -> Option<SecretString> {
        let entries = self.entries.read().await;
        entries
            .get(name)
            .filter(|e| Utc::now() < e.expires_at)
            .map(|e| e.value.clone())
    }

    async fn stale(&self, name: &str) -> Option<SecretString> {
        let entries = self.entries.read().await;
        entries.get(name).map(|e| e.value.clone())
    }
}

impl std::fmt::Debug for CachedSecretProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedSecretProvider")
            .field("provider_type", &self.inner.provider_type())
            .finish()
    }
}

#[async_trait]
impl SecretProvider for CachedSecretProvider {
    async fn get_secret(&self, name: &str) -> Result<SecretString, SecretError> {
        if let Some(value) = self.fresh(name).await {
            tracing::debug!(secret_name = name, "secret cache hit");
            return Ok(value);
        }

        match self.inner.get_secret(name).await {
            Ok(value) => {
                let mut entries = self.entries.write().await;
                entries.insert(
                    name.to_string(),
                    CachedEntry {
                        value: value.clone(),
                        expires_at: Utc::now() + self.ttl,
                    },
                );
                Ok(value)
            }
            Err(e) => {
                if let Some(stale) = self.stale(name).await {
                    tracing::warn!(
                        secret_name = name,
                        provider = self.inner.provider_type(),
                        error = %e,
                        "provider unavailable, serving stale cached secret"
                    );
                    return Ok(stale);
                }
                Err(e)
            }
        }
    }

    async fn health_check(&self) -> Result<bool, SecretError> {
        self.inner.health_check().await
    }

    fn provider_type(&self) -> &'static str {
        self.inner.provider_type()
    }
}
