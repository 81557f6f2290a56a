//! Legacy tenant credential validation.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::error::{JitError, JitResult};

/// Result of checking a username/password pair against the legacy tenant.
#[derive(Debug, Clone)]
pub struct AuthenticationOutcome {
    pub success: bool,
    pub error_code: Option<String>,
    pub error_description: Option<String>,
    /// The user's object id in the legacy tenant, when reported.
    pub user_id: Option<String>,
    /// Whether the account is locked out rather than the password wrong.
    pub locked_out: bool,
}

impl AuthenticationOutcome {
    #[must_use]
    pub fn succeeded(user_id: Option<String>) -> Self {
        Self {
            success: true,
            error_code: None,
            error_description: None,
            user_id,
            locked_out: false,
        }
    }

    #[must_use]
    pub fn failed(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            success: false,
            error_code: Some(code.into()),
            error_description: Some(description.into()),
            user_id: None,
            locked_out: false,
        }
    }
}

/// Validates credentials against the legacy identity tenant.
///
/// One synchronous check per sign-in; implementations must not retry
/// internally, because the pipeline runs under the external caller's
/// timeout budget.
#[async_trait]
pub trait LegacyCredentialValidator: Send + Sync {
    async fn validate_credentials(
        &self,
        username: &str,
        password: &str,
        cancel: &CancellationToken,
    ) -> JitResult<AuthenticationOutcome>;
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
    #[serde(default)]
    error_codes: Vec<u64>,
}

#[derive(Debug, Deserialize)]
struct TokenSuccessResponse {
    #[allow(dead_code)]
    access_token: Option<String>,
}

/// Validates credentials with a resource-owner password grant against the
/// legacy tenant's token endpoint.
pub struct RopcCredentialValidator {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    scope: String,
}

/// Error code the legacy authority uses for a locked-out account.
const LOCKED_OUT_CODE: u64 = 50053;

impl RopcCredentialValidator {
    /// Creates a validator for the given token endpoint and public client.
    ///
    /// The HTTP timeout is deliberately tight: this call sits inside the
    /// sign-in latency budget.
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        scope: impl Into<String>,
        timeout: Duration,
    ) -> JitResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| JitError::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            token_url: token_url.into(),
            client_id: client_id.into(),
            scope: scope.into(),
        })
    }
}

#[async_trait]
impl LegacyCredentialValidator for RopcCredentialValidator {
    #[instrument(skip(self, password, cancel), fields(username))]
    async fn validate_credentials(
        &self,
        username: &str,
        password: &str,
        cancel: &CancellationToken,
    ) -> JitResult<AuthenticationOutcome> {
        let params = [
            ("grant_type", "password"),
            ("client_id", self.client_id.as_str()),
            ("scope", self.scope.as_str()),
            ("username", username),
            ("password", password),
        ];

        let request = self.http.post(&self.token_url).form(&params).send();
        let response = tokio::select! {
            () = cancel.cancelled() => return Err(JitError::Cancelled),
            result = request => result?,
        };

        if response.status().is_success() {
            // The grant succeeded; the token itself is discarded.
            let _: TokenSuccessResponse = response.json().await.unwrap_or(TokenSuccessResponse {
                access_token: None,
            });
            debug!("legacy credentials validated");
            return Ok(AuthenticationOutcome::succeeded(None));
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let parsed: TokenErrorResponse =
            serde_json::from_str(&body).unwrap_or(TokenErrorResponse {
                error: None,
                error_description: None,
                error_codes: Vec::new(),
            });

        // invalid_grant is the expected wrong-credentials answer, not a
        // transport failure.
        if status.as_u16() == 400 && parsed.error.is_some() {
            let code = parsed.error.unwrap_or_default();
            let description = parsed.error_description.unwrap_or_default();
            let locked_out = parsed.error_codes.contains(&LOCKED_OUT_CODE);
            if locked_out {
                warn!(username, "legacy account is locked out");
            } else {
                debug!(username, code, "legacy credential validation failed");
            }
            let mut outcome = AuthenticationOutcome::failed(code, description);
            outcome.locked_out = locked_out;
            return Ok(outcome);
        }

        Err(JitError::Validator(format!(
            "legacy token endpoint returned status {status}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn validator(server: &MockServer) -> RopcCredentialValidator {
        RopcCredentialValidator::new(
            format!("{}/legacy/oauth2/v2.0/token", server.uri()),
            "public-client",
            "openid",
            Duration::from_secs(2),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn valid_credentials_succeed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/legacy/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=password"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token_type": "Bearer",
                "access_token": "tok",
                "expires_in": 3600
            })))
            .mount(&server)
            .await;

        let outcome = validator(&server)
            .validate_credentials("jo@legacy.example", "Abcdef1!", &CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.success);
    }

    #[tokio::test]
    async fn invalid_grant_is_a_failed_outcome_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/legacy/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "AADSTS50126: Error validating credentials.",
                "error_codes": [50126]
            })))
            .mount(&server)
            .await;

        let outcome = validator(&server)
            .validate_credentials("jo@legacy.example", "wrong", &CancellationToken::new())
            .await
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.error_code.as_deref(), Some("invalid_grant"));
        assert!(!outcome.locked_out);
    }

    #[tokio::test]
    async fn lockout_code_is_flagged() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/legacy/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "AADSTS50053: account locked",
                "error_codes": [50053]
            })))
            .mount(&server)
            .await;

        let outcome = validator(&server)
            .validate_credentials("jo@legacy.example", "wrong", &CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.locked_out);
    }

    #[tokio::test]
    async fn server_error_surfaces_as_validator_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/legacy/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = validator(&server)
            .validate_credentials("jo@legacy.example", "pw", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, JitError::Validator(_)));
    }

    #[tokio::test]
    async fn cancellation_aborts_the_check() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/legacy/oauth2/v2.0/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(5))
                    .set_body_json(json!({ "access_token": "tok" })),
            )
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        let validator = validator(&server);
        let check = validator.validate_credentials("jo@legacy.example", "pw", &cancel);
        let cancel_soon = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        };
        let (result, ()) = tokio::join!(check, cancel_soon);
        assert!(matches!(result.unwrap_err(), JitError::Cancelled));
    }
}
