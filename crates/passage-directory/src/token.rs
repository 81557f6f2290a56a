//! OAuth2 client-credentials tokens, cached per app registration.

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::error::{DirectoryError, DirectoryResult};

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// True if the token is expired or will expire within the grace period.
    fn is_expired(&self, grace: Duration) -> bool {
        Utc::now() + grace >= self.expires_at
    }
}

/// Acquires and caches an app-only access token for one app registration.
///
/// Each pooled credential owns its own cache so rotation across credentials
/// also rotates the rate-limit buckets the tokens belong to.
pub struct TokenCache {
    client_id: String,
    client_secret: SecretString,
    token_url: String,
    scope: String,
    http: reqwest::Client,
    cached: RwLock<Option<CachedToken>>,
    grace: Duration,
}

impl std::fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCache")
            .field("client_id", &self.client_id)
            .field("token_url", &self.token_url)
            .finish()
    }
}

impl TokenCache {
    /// Creates a cache for the given app registration.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        client_secret: SecretString,
        token_url: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            token_url: token_url.into(),
            scope: scope.into(),
            http: reqwest::Client::new(),
            cached: RwLock::new(None),
            grace: Duration::minutes(5),
        }
    }

    /// The app registration's client id.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns a valid access token, refreshing it if necessary.
    #[instrument(skip(self), fields(client_id = %self.client_id))]
    pub async fn get_token(&self) -> DirectoryResult<String> {
        {
            let cache = self.cached.read().await;
            if let Some(ref token) = *cache {
                if !token.is_expired(self.grace) {
                    debug!("using cached token");
                    return Ok(token.access_token.clone());
                }
            }
        }

        debug!("refreshing access token");
        let new_token = self.acquire().await?;
        let access_token = new_token.access_token.clone();
        {
            let mut cache = self.cached.write().await;
            *cache = Some(new_token);
        }
        Ok(access_token)
    }

    /// Drops the cached token, forcing a refresh on next use.
    pub async fn invalidate(&self) {
        let mut cache = self.cached.write().await;
        *cache = None;
    }

    async fn acquire(&self) -> DirectoryResult<CachedToken> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", &self.client_id),
            ("client_secret", self.client_secret.expose_secret()),
            ("scope", &self.scope),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| DirectoryError::Auth(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DirectoryError::Auth(format!(
                "token request failed with status {status}: {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| DirectoryError::Auth(format!("failed to parse token response: {e}")))?;

        let expires_at = Utc::now() + Duration::seconds(token.expires_in);
        debug!(%expires_at, "acquired new token");

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cached_token_expiry_honors_grace() {
        let token = CachedToken {
            access_token: "t".to_string(),
            expires_at: Utc::now() + Duration::minutes(10),
        };
        assert!(!token.is_expired(Duration::minutes(5)));
        assert!(token.is_expired(Duration::minutes(15)));
    }

    #[test]
    fn already_expired_token() {
        let token = CachedToken {
            access_token: "t".to_string(),
            expires_at: Utc::now() - Duration::minutes(1),
        };
        assert!(token.is_expired(Duration::zero()));
    }

    #[test]
    fn debug_omits_secret() {
        let cache = TokenCache::new(
            "client-1",
            SecretString::new("s3cret".to_string()),
            "https://login.example/t/token",
            "scope",
        );
        let rendered = format!("{cache:?}");
        assert!(!rendered.contains("s3cret"));
    }
}
