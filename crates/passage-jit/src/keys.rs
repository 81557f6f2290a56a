//! Decryption key sourcing and RSA key utilities.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rsa::pkcs8::{DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use secrecy::SecretString;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use passage_secrets::SecretProvider;

use crate::decrypt::import_private_key;
use crate::error::{JitError, JitResult};

/// Sources the RSA private key used to open password-context envelopes.
///
/// The key comes from a secret provider (production) or an inline PEM
/// (non-production only) and is cached in memory after first use. The cache
/// populates under a write lock with a second look after acquiring it, so
/// concurrent first sign-ins trigger a single secret-store fetch.
pub struct PrivateKeyCache {
    provider: Option<Arc<dyn SecretProvider>>,
    secret_name: String,
    inline_pem: Option<SecretString>,
    cache_enabled: bool,
    cached: RwLock<Option<SecretString>>,
}

impl PrivateKeyCache {
    /// Key sourced from a secret provider under the given name.
    #[must_use]
    pub fn from_provider(provider: Arc<dyn SecretProvider>, secret_name: impl Into<String>) -> Self {
        Self {
            provider: Some(provider),
            secret_name: secret_name.into(),
            inline_pem: None,
            cache_enabled: true,
            cached: RwLock::new(None),
        }
    }

    /// Key supplied inline. For local development only; never ship a
    /// private key in configuration.
    #[must_use]
    pub fn from_inline_pem(pem: SecretString) -> Self {
        warn!("using inline decryption key (non-production mode)");
        Self {
            provider: None,
            secret_name: String::new(),
            inline_pem: Some(pem),
            cache_enabled: true,
            cached: RwLock::new(None),
        }
    }

    /// Disables in-memory caching; every lookup goes to the source.
    #[must_use]
    pub fn without_caching(mut self) -> Self {
        self.cache_enabled = false;
        self
    }

    /// Returns the private key PEM.
    pub async fn get(&self) -> JitResult<SecretString> {
        if self.cache_enabled {
            let cached = self.cached.read().await;
            if let Some(ref pem) = *cached {
                debug!("using cached decryption key");
                return Ok(pem.clone());
            }
        }

        let mut cached = self.cached.write().await;
        // Re-check under the write lock: another task may have loaded the
        // key while this one waited.
        if self.cache_enabled {
            if let Some(ref pem) = *cached {
                return Ok(pem.clone());
            }
        }

        let pem = match (&self.provider, &self.inline_pem) {
            (Some(provider), _) => {
                info!(secret_name = %self.secret_name, "loading decryption key from secret store");
                provider.get_secret(&self.secret_name).await?
            }
            (None, Some(inline)) => inline.clone(),
            (None, None) => {
                return Err(JitError::Config(
                    "no decryption key source configured".to_string(),
                ))
            }
        };

        if self.cache_enabled {
            *cached = Some(pem.clone());
        }
        Ok(pem)
    }

    /// Drops the cached key, forcing a reload on next use.
    pub async fn invalidate(&self) {
        let mut cached = self.cached.write().await;
        *cached = None;
    }
}

/// Derives and exports the public key PEM for a private key.
///
/// Used to hand the encryption key to the replacement tenant's extension
/// configuration.
pub fn public_key_pem(private_key_pem: &str) -> JitResult<String> {
    let private = import_private_key(private_key_pem)
        .map_err(|e| JitError::Config(format!("invalid private key: {e}")))?;
    RsaPublicKey::from(&private)
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| JitError::Config(format!("public key export failed: {e}")))
}

/// Exports the public key as a JWK suitable for payload-encryption
/// configuration.
pub fn public_key_jwk(private_key_pem: &str) -> JitResult<serde_json::Value> {
    let private = import_private_key(private_key_pem)
        .map_err(|e| JitError::Config(format!("invalid private key: {e}")))?;
    let public = RsaPublicKey::from(&private);
    Ok(serde_json::json!({
        "kty": "RSA",
        "use": "enc",
        "alg": "RSA-OAEP",
        "n": URL_SAFE_NO_PAD.encode(public.n().to_bytes_be()),
        "e": URL_SAFE_NO_PAD.encode(public.e().to_bytes_be()),
    }))
}

/// Checks that a private and public PEM form a matching pair by running an
/// encrypt/decrypt probe.
#[must_use]
pub fn validate_key_pair(private_key_pem: &str, public_key_pem: &str) -> bool {
    let Ok(private) = import_private_key(private_key_pem) else {
        return false;
    };
    let Ok(public) = RsaPublicKey::from_public_key_pem(public_key_pem) else {
        return false;
    };
    let probe = b"passage-key-probe";
    let Ok(sealed) = public.encrypt(&mut rand::thread_rng(), Oaep::new::<sha1::Sha1>(), probe)
    else {
        return false;
    };
    match private.decrypt(Oaep::new::<sha1::Sha1>(), &sealed) {
        Ok(opened) => opened == probe,
        Err(_) => false,
    }
}

/// Generates a fresh RSA key pair as (private PEM, public PEM).
///
/// For tests and local development; production keys are generated and held
/// by the secret store.
#[must_use]
pub fn generate_key_pair_for_tests(bits: usize) -> (String, String) {
    // Key generation over a CSPRNG only fails on invalid bit sizes, which
    // callers control.
    let private = RsaPrivateKey::new(&mut rand::thread_rng(), bits)
        .expect("RSA key generation with a valid bit size");
    let private_pem = private
        .to_pkcs8_pem(LineEnding::LF)
        .expect("PKCS#8 export of a freshly generated key")
        .to_string();
    let public_pem = RsaPublicKey::from(&private)
        .to_public_key_pem(LineEnding::LF)
        .expect("SPKI export of a freshly generated key");
    (private_pem, public_pem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use passage_secrets::SecretError;
    use secrecy::ExposeSecret;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct SlowProvider {
        calls: AtomicU32,
    }

    #[async_trait]
    impl SecretProvider for SlowProvider {
        async fn get_secret(&self, _name: &str) -> Result<SecretString, SecretError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            Ok(SecretString::new("the-key".to_string()))
        }

        async fn health_check(&self) -> Result<bool, SecretError> {
            Ok(true)
        }

        fn provider_type(&self) -> &'static str {
            "slow"
        }
    }

    #[tokio::test]
    async fn concurrent_first_use_fetches_once() {
        let provider = Arc::new(SlowProvider {
            calls: AtomicU32::new(0),
        });
        let cache = Arc::new(PrivateKeyCache::from_provider(
            provider.clone(),
            "jit-decryption-key",
        ));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move { cache.get().await.unwrap() }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().expose_secret(), "the-key");
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_reload() {
        let provider = Arc::new(SlowProvider {
            calls: AtomicU32::new(0),
        });
        let cache = PrivateKeyCache::from_provider(provider.clone(), "jit-decryption-key");
        cache.get().await.unwrap();
        cache.invalidate().await;
        cache.get().await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn inline_key_is_served_without_a_provider() {
        let cache = PrivateKeyCache::from_inline_pem(SecretString::new("pem".to_string()));
        assert_eq!(cache.get().await.unwrap().expose_secret(), "pem");
    }

    #[test]
    fn generated_pair_validates_and_mismatched_pair_does_not() {
        let (private_a, public_a) = generate_key_pair_for_tests(2048);
        let (_, public_b) = generate_key_pair_for_tests(2048);
        assert!(validate_key_pair(&private_a, &public_a));
        assert!(!validate_key_pair(&private_a, &public_b));
    }

    #[test]
    fn jwk_export_has_rsa_fields() {
        let (private_pem, _) = generate_key_pair_for_tests(2048);
        let jwk = public_key_jwk(&private_pem).unwrap();
        assert_eq!(jwk["kty"], "RSA");
        assert_eq!(jwk["use"], "enc");
        assert!(jwk["n"].as_str().is_some_and(|n| !n.is_empty()));
    }

    #[test]
    fn public_pem_derives_from_private() {
        let (private_pem, public_pem) = generate_key_pair_for_tests(2048);
        assert_eq!(public_key_pem(&private_pem).unwrap(), public_pem);
    }
}
