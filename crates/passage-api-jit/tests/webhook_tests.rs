//! End-to-end tests for the sign-in event webhook.

use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use secrecy::SecretString;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use passage_api_jit::{jit_router, JitApiState};
use passage_jit::{
    keys, AuthenticationOutcome, JitMigrationPipeline, JitOptions, JitResult,
    LegacyCredentialValidator, PrivateKeyCache,
};

/// Validator that accepts exactly one password and records the username it
/// was asked about.
struct StubValidator {
    accept_password: Option<String>,
    seen_usernames: Mutex<Vec<String>>,
}

impl StubValidator {
    fn accepting(password: &str) -> Self {
        Self {
            accept_password: Some(password.to_string()),
            seen_usernames: Mutex::new(Vec::new()),
        }
    }

    fn rejecting() -> Self {
        Self {
            accept_password: None,
            seen_usernames: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl LegacyCredentialValidator for StubValidator {
    async fn validate_credentials(
        &self,
        username: &str,
        password: &str,
        _cancel: &CancellationToken,
    ) -> JitResult<AuthenticationOutcome> {
        self.seen_usernames
            .lock()
            .unwrap()
            .push(username.to_string());
        match &self.accept_password {
            Some(expected) if expected == password => {
                Ok(AuthenticationOutcome::succeeded(Some("legacy-u1".into())))
            }
            _ => Ok(AuthenticationOutcome::failed(
                "invalid_grant",
                "bad credentials",
            )),
        }
    }
}

fn state_with(validator: Arc<StubValidator>, key_cache: PrivateKeyCache) -> JitApiState {
    let pipeline = JitMigrationPipeline::new(validator, JitOptions::default());
    JitApiState::new(
        Arc::new(pipeline),
        Arc::new(key_cache),
        "legacy.example",
    )
}

fn plaintext_event(password: &str, nonce: &str) -> String {
    json!({
        "data": {
            "@odata.type": "microsoft.graph.onPasswordSubmitCalloutData",
            "tenantId": "t-1",
            "authenticationContext": {
                "correlationId": "corr-1",
                "user": {
                    "id": "u-1",
                    "userPrincipalName": "jo@replacement.example"
                }
            },
            "passwordContext": { "userPassword": password, "nonce": nonce }
        }
    })
    .to_string()
}

async fn post_event(state: JitApiState, body: String) -> Value {
    let response = jit_router(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn action_type(response: &Value) -> &str {
    response["data"]["actions"][0]["@odata.type"]
        .as_str()
        .unwrap()
}

fn unused_key_cache() -> PrivateKeyCache {
    PrivateKeyCache::from_inline_pem(SecretString::new("unused".to_string()))
}

#[tokio::test]
async fn get_returns_readiness_acknowledgment() {
    let state = state_with(Arc::new(StubValidator::rejecting()), unused_key_cache());
    let response = jit_router(state)
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.to_lowercase().contains("ready"));
}

#[tokio::test]
async fn valid_credentials_and_strong_password_migrate() {
    let validator = Arc::new(StubValidator::accepting("Abcdef1!"));
    let state = state_with(Arc::clone(&validator), unused_key_cache());

    let response = post_event(state, plaintext_event("Abcdef1!", "n-1")).await;
    assert_eq!(
        action_type(&response),
        "microsoft.graph.passwordsubmit.MigratePassword"
    );
    // The nonce from the request is echoed back.
    assert_eq!(response["data"]["nonce"], "n-1");
    // The legacy tenant was asked about the re-domained principal name.
    assert_eq!(
        validator.seen_usernames.lock().unwrap().as_slice(),
        ["jo@legacy.example"]
    );
}

#[tokio::test]
async fn weak_password_blocks_with_complexity_message() {
    let validator = Arc::new(StubValidator::accepting("abcdefgh"));
    let state = state_with(validator, unused_key_cache());

    let response = post_event(state, plaintext_event("abcdefgh", "n-1")).await;
    assert_eq!(
        action_type(&response),
        "microsoft.graph.passwordsubmit.Block"
    );
    assert_eq!(
        response["data"]["actions"][0]["title"],
        "Password Requirements Not Met"
    );
}

#[tokio::test]
async fn invalid_legacy_credentials_block_regardless_of_strength() {
    let state = state_with(Arc::new(StubValidator::rejecting()), unused_key_cache());

    let response = post_event(state, plaintext_event("Abcdef1!", "n-1")).await;
    assert_eq!(
        action_type(&response),
        "microsoft.graph.passwordsubmit.Block"
    );
    assert_eq!(
        response["data"]["actions"][0]["title"],
        "Authentication Failed"
    );
}

#[tokio::test]
async fn malformed_json_yields_a_block_decision() {
    let state = state_with(Arc::new(StubValidator::rejecting()), unused_key_cache());
    let response = post_event(state, "{not json".to_string()).await;
    assert_eq!(
        action_type(&response),
        "microsoft.graph.passwordsubmit.Block"
    );
    assert_eq!(response["data"]["actions"][0]["title"], "Invalid Request");
}

#[tokio::test]
async fn missing_user_id_yields_a_block_decision() {
    let state = state_with(
        Arc::new(StubValidator::accepting("Abcdef1!")),
        unused_key_cache(),
    );
    let body = json!({
        "data": {
            "authenticationContext": {
                "user": { "userPrincipalName": "jo@replacement.example" }
            },
            "passwordContext": { "userPassword": "Abcdef1!" }
        }
    })
    .to_string();
    let response = post_event(state, body).await;
    assert_eq!(response["data"]["actions"][0]["title"], "Invalid Request");
}

#[tokio::test]
async fn missing_principal_name_is_a_configuration_block() {
    let state = state_with(
        Arc::new(StubValidator::accepting("Abcdef1!")),
        unused_key_cache(),
    );
    let body = json!({
        "data": {
            "authenticationContext": { "user": { "id": "u-1" } },
            "passwordContext": { "userPassword": "Abcdef1!" }
        }
    })
    .to_string();
    let response = post_event(state, body).await;
    assert_eq!(
        response["data"]["actions"][0]["title"],
        "Configuration Error"
    );
}

mod encrypted {
    use super::*;
    use aes_gcm::aead::{Aead, KeyInit, Payload};
    use aes_gcm::{Aes256Gcm, Nonce};
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use rand::RngCore;
    use rsa::pkcs8::DecodePublicKey;
    use rsa::{Oaep, RsaPublicKey};

    /// Builds the nested token the replacement tenant sends: inner unsigned
    /// token wrapped in a compact RSA-OAEP + A256GCM envelope.
    fn encrypt_context(password: &str, nonce: &str, public_key_pem: &str) -> String {
        let inner = format!(
            "{}.{}.",
            URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#),
            URL_SAFE_NO_PAD
                .encode(json!({ "user-password": password, "nonce": nonce }).to_string()),
        );

        let header_b64 = URL_SAFE_NO_PAD.encode(r#"{"alg":"RSA-OAEP","enc":"A256GCM"}"#);
        let mut cek = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut cek);
        let mut iv = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut iv);

        let sealed = Aes256Gcm::new_from_slice(&cek)
            .unwrap()
            .encrypt(
                Nonce::from_slice(&iv),
                Payload {
                    msg: inner.as_bytes(),
                    aad: header_b64.as_bytes(),
                },
            )
            .unwrap();
        let (ciphertext, tag) = sealed.split_at(sealed.len() - 16);

        let public_key = RsaPublicKey::from_public_key_pem(public_key_pem).unwrap();
        let encrypted_key = public_key
            .encrypt(&mut rand::thread_rng(), Oaep::new::<sha1::Sha1>(), &cek)
            .unwrap();

        format!(
            "{}.{}.{}.{}.{}",
            header_b64,
            URL_SAFE_NO_PAD.encode(encrypted_key),
            URL_SAFE_NO_PAD.encode(iv),
            URL_SAFE_NO_PAD.encode(ciphertext),
            URL_SAFE_NO_PAD.encode(tag),
        )
    }

    fn encrypted_event(token: &str) -> String {
        json!({
            "data": {
                "authenticationContext": {
                    "correlationId": "corr-enc",
                    "user": {
                        "id": "u-1",
                        "userPrincipalName": "jo@replacement.example"
                    }
                },
                "encryptedPasswordContext": token
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn encrypted_context_is_decrypted_and_nonce_echoed() {
        let (private_pem, public_pem) = keys::generate_key_pair_for_tests(2048);
        let validator = Arc::new(StubValidator::accepting("Abcdef1!"));
        let state = state_with(
            Arc::clone(&validator),
            PrivateKeyCache::from_inline_pem(SecretString::new(private_pem)),
        );

        let token = encrypt_context("Abcdef1!", "nonce-enc", &public_pem);
        let response = post_event(state, encrypted_event(&token)).await;

        assert_eq!(
            action_type(&response),
            "microsoft.graph.passwordsubmit.MigratePassword"
        );
        assert_eq!(response["data"]["nonce"], "nonce-enc");
    }

    #[tokio::test]
    async fn undecryptable_context_blocks_without_detail() {
        let (private_pem, _) = keys::generate_key_pair_for_tests(2048);
        let (_, other_public) = keys::generate_key_pair_for_tests(2048);
        let state = state_with(
            Arc::new(StubValidator::accepting("Abcdef1!")),
            PrivateKeyCache::from_inline_pem(SecretString::new(private_pem)),
        );

        // Encrypted for a key this deployment does not hold.
        let token = encrypt_context("Abcdef1!", "n", &other_public);
        let response = post_event(state, encrypted_event(&token)).await;

        assert_eq!(
            action_type(&response),
            "microsoft.graph.passwordsubmit.Block"
        );
        assert_eq!(response["data"]["actions"][0]["title"], "Decryption Error");
        let message = response["data"]["actions"][0]["message"].as_str().unwrap();
        assert!(!message.to_lowercase().contains("key"));
    }
}
