//! Webhook handlers for the password-submit event.

use std::time::Instant;

use axum::extract::State;
use axum::Json;
use secrecy::ExposeSecret;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use passage_jit::{JitMigrationResult, JitRequest, PasswordContextDecryptor};

use crate::models::{SignInEventRequest, SignInEventResponse};
use crate::router::JitApiState;

/// GET handler: static readiness acknowledgment.
pub async fn readiness() -> &'static str {
    "Just-in-time authentication endpoint ready"
}

/// POST handler: decide on one password-submit event.
///
/// The body is parsed by hand rather than through the JSON extractor so a
/// malformed payload still yields an HTTP 200 block response, as the
/// protocol requires. Every failure path fails closed.
pub async fn password_submit(
    State(state): State<JitApiState>,
    body: String,
) -> Json<SignInEventResponse> {
    let request_id = Uuid::new_v4().to_string();
    let started = Instant::now();
    info!(request_id, body_len = body.len(), "sign-in event received");

    let event: SignInEventRequest = match serde_json::from_str(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(request_id, error = %e, "malformed sign-in event payload");
            return block(
                "Invalid Request",
                "The authentication request is malformed.",
                None,
            );
        }
    };
    let Some(data) = event.data else {
        warn!(request_id, "sign-in event missing data object");
        return block(
            "Invalid Request",
            "The authentication request is malformed.",
            None,
        );
    };

    let auth_context = data.authentication_context.unwrap_or_default();
    let user = auth_context.user.unwrap_or_default();
    let correlation_id = auth_context
        .correlation_id
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| request_id.clone());

    // Password extraction: the encrypted context is the production path;
    // the plaintext context is the test-harness fallback.
    let (password, nonce) = match data
        .encrypted_password_context
        .filter(|token| !token.is_empty())
    {
        Some(token) => {
            let key = match state.key_cache.get().await {
                Ok(key) => key,
                Err(e) => {
                    error!(request_id, correlation_id, error = %e, "decryption key unavailable");
                    return block(
                        "Decryption Error",
                        "Unable to process authentication request.",
                        None,
                    );
                }
            };
            match PasswordContextDecryptor::decrypt(&token, key.expose_secret()) {
                Ok(ctx) => (Some(ctx.password), ctx.nonce),
                Err(e) => {
                    error!(request_id, correlation_id, error = %e, "password context decryption failed");
                    return block(
                        "Decryption Error",
                        "Unable to process authentication request.",
                        None,
                    );
                }
            }
        }
        None => {
            let plain = data.password_context.unwrap_or_default();
            (plain.user_password, plain.nonce)
        }
    };

    let Some(user_id) = user.id.filter(|id| !id.is_empty()) else {
        warn!(request_id, correlation_id, "sign-in event missing user id");
        return block(
            "Invalid Request",
            "Required authentication information is missing.",
            nonce,
        );
    };
    let Some(password) = password.filter(|p| !p.is_empty()) else {
        warn!(request_id, correlation_id, "sign-in event missing password");
        return block(
            "Invalid Request",
            "Required authentication information is missing.",
            nonce,
        );
    };
    let Some(upn) = user.user_principal_name.filter(|u| !u.is_empty()) else {
        warn!(request_id, correlation_id, "sign-in event missing principal name");
        return block(
            "Configuration Error",
            "Unable to validate credentials. Please contact support.",
            nonce,
        );
    };

    // The event carries the replacement tenant's UPN; the legacy tenant
    // knows the user under its own domain.
    let legacy_upn = passage_core::upn::with_domain(&upn, &state.legacy_tenant_domain);

    let jit_request = JitRequest {
        user_id,
        principal_name: legacy_upn,
        password,
        correlation_id: correlation_id.clone(),
    };
    let cancel = CancellationToken::new();
    let result = state.pipeline.run(&jit_request, &cancel).await;

    info!(
        request_id,
        correlation_id,
        action = ?result.action,
        duration_ms = started.elapsed().as_millis() as u64,
        has_nonce = nonce.is_some(),
        "sign-in event answered"
    );
    Json(SignInEventResponse::from_result(result, nonce))
}

fn block(title: &str, message: &str, nonce: Option<String>) -> Json<SignInEventResponse> {
    Json(SignInEventResponse::from_result(
        JitMigrationResult::blocked(title, message),
        nonce,
    ))
}
