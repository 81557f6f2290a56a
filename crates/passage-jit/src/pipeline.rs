//! The sign-in-time migration decision pipeline.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::context::JitMigrationResult;
use crate::policy::PasswordPolicy;
use crate::validator::LegacyCredentialValidator;

/// Options for the JIT pipeline.
#[derive(Debug, Clone)]
pub struct JitOptions {
    /// Skips legacy credential validation. Never enable outside
    /// non-production contexts; the server refuses it in production.
    pub test_mode: bool,
    /// Hard budget for the whole pipeline. The invoking protocol enforces
    /// its own ~2s timeout, so this must stay comfortably below it.
    pub timeout: Duration,
    pub policy: PasswordPolicy,
}

impl Default for JitOptions {
    fn default() -> Self {
        Self {
            test_mode: false,
            timeout: Duration::from_millis(1500),
            policy: PasswordPolicy::default(),
        }
    }
}

/// One sign-in event to decide on.
#[derive(Clone)]
pub struct JitRequest {
    /// User object id in the replacement tenant.
    pub user_id: String,
    /// Principal name already re-domained for the legacy tenant.
    pub principal_name: String,
    pub password: String,
    pub correlation_id: String,
}

impl std::fmt::Debug for JitRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JitRequest")
            .field("user_id", &self.user_id)
            .field("principal_name", &self.principal_name)
            .field("password", &"[REDACTED]")
            .field("correlation_id", &self.correlation_id)
            .finish()
    }
}

/// Decides whether a sign-in should migrate the user's password.
///
/// Strictly sequential, no branching back: validate legacy credentials,
/// then password complexity, then succeed with a migrate-password action.
/// Any stage failure is a terminal block; any unexpected error is a generic
/// block. The pipeline never errors out to the caller and never mutates
/// directory state — applying the decision is the caller's job.
pub struct JitMigrationPipeline {
    validator: Arc<dyn LegacyCredentialValidator>,
    options: JitOptions,
}

impl JitMigrationPipeline {
    #[must_use]
    pub fn new(validator: Arc<dyn LegacyCredentialValidator>, options: JitOptions) -> Self {
        Self { validator, options }
    }

    /// Runs the pipeline for one sign-in event.
    #[instrument(skip(self, request, cancel), fields(
        user_id = %request.user_id,
        correlation_id = %request.correlation_id,
    ))]
    pub async fn run(
        &self,
        request: &JitRequest,
        cancel: &CancellationToken,
    ) -> JitMigrationResult {
        let started = Instant::now();

        if cancel.is_cancelled() {
            warn!("sign-in event already cancelled on arrival");
            return JitMigrationResult::system_error();
        }

        let result = match tokio::time::timeout(
            self.options.timeout,
            self.execute(request, cancel),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                error!(
                    budget_ms = self.options.timeout.as_millis() as u64,
                    "pipeline exceeded its latency budget"
                );
                JitMigrationResult::system_error()
            }
        };

        info!(
            action = ?result.action,
            total_ms = started.elapsed().as_millis() as u64,
            "jit migration decision"
        );
        result
    }

    async fn execute(
        &self,
        request: &JitRequest,
        cancel: &CancellationToken,
    ) -> JitMigrationResult {
        // Stage 1: validate credentials against the legacy tenant. One
        // synchronous check, no retries; the budget forbids them.
        let stage_started = Instant::now();
        if self.options.test_mode {
            warn!("test mode: skipping legacy credential validation, all passwords accepted");
        } else {
            let outcome = match self
                .validator
                .validate_credentials(&request.principal_name, &request.password, cancel)
                .await
            {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(error = %e, "legacy credential validation errored");
                    return JitMigrationResult::system_error();
                }
            };
            if !outcome.success {
                warn!(
                    code = outcome.error_code.as_deref().unwrap_or_default(),
                    locked_out = outcome.locked_out,
                    stage_ms = stage_started.elapsed().as_millis() as u64,
                    "legacy credential validation failed"
                );
                return JitMigrationResult::blocked(
                    "Authentication Failed",
                    "The credentials you provided are incorrect.",
                );
            }
        }
        let stage1_ms = stage_started.elapsed().as_millis() as u64;

        // Stage 2: the presented password must satisfy the replacement
        // tenant's complexity rules before it can be adopted.
        let stage_started = Instant::now();
        let validation = self.options.policy.validate(&request.password);
        if !validation.is_valid {
            warn!(
                violation_count = validation.violations.len(),
                stage_ms = stage_started.elapsed().as_millis() as u64,
                "password does not meet complexity requirements"
            );
            return JitMigrationResult::blocked(
                "Password Requirements Not Met",
                "Your password does not meet the required complexity standards.",
            );
        }
        let stage2_ms = stage_started.elapsed().as_millis() as u64;

        info!(
            stage1_ms,
            stage2_ms,
            "pipeline stages passed, returning migrate-password"
        );
        JitMigrationResult::migrate_password()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MigrationAction;
    use crate::error::{JitError, JitResult};
    use crate::validator::AuthenticationOutcome;
    use async_trait::async_trait;

    struct StubValidator {
        behavior: Behavior,
    }

    enum Behavior {
        Accept,
        Reject,
        Fail,
        Hang,
    }

    #[async_trait]
    impl LegacyCredentialValidator for StubValidator {
        async fn validate_credentials(
            &self,
            _username: &str,
            _password: &str,
            _cancel: &CancellationToken,
        ) -> JitResult<AuthenticationOutcome> {
            match self.behavior {
                Behavior::Accept => Ok(AuthenticationOutcome::succeeded(Some("u-1".into()))),
                Behavior::Reject => Ok(AuthenticationOutcome::failed(
                    "invalid_grant",
                    "bad credentials",
                )),
                Behavior::Fail => Err(JitError::Validator("endpoint unreachable".into())),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok(AuthenticationOutcome::succeeded(None))
                }
            }
        }
    }

    fn pipeline(behavior: Behavior, options: JitOptions) -> JitMigrationPipeline {
        JitMigrationPipeline::new(Arc::new(StubValidator { behavior }), options)
    }

    fn request(password: &str) -> JitRequest {
        JitRequest {
            user_id: "u-1".to_string(),
            principal_name: "jo@legacy.example".to_string(),
            password: password.to_string(),
            correlation_id: "corr-1".to_string(),
        }
    }

    #[tokio::test]
    async fn valid_credentials_and_strong_password_migrate() {
        let pipeline = pipeline(Behavior::Accept, JitOptions::default());
        let result = pipeline
            .run(&request("Abcdef1!"), &CancellationToken::new())
            .await;
        assert_eq!(result.action, MigrationAction::MigratePassword);
        assert!(result.title.is_none());
        assert!(result.message.is_none());
    }

    #[tokio::test]
    async fn weak_password_blocks_with_complexity_message() {
        let pipeline = pipeline(Behavior::Accept, JitOptions::default());
        let result = pipeline
            .run(&request("abcdefgh"), &CancellationToken::new())
            .await;
        assert_eq!(result.action, MigrationAction::Block);
        assert_eq!(result.title.as_deref(), Some("Password Requirements Not Met"));
    }

    #[tokio::test]
    async fn invalid_credentials_block_regardless_of_password_strength() {
        let pipeline = pipeline(Behavior::Reject, JitOptions::default());
        let result = pipeline
            .run(&request("Abcdef1!"), &CancellationToken::new())
            .await;
        assert_eq!(result.action, MigrationAction::Block);
        assert_eq!(result.title.as_deref(), Some("Authentication Failed"));
    }

    #[tokio::test]
    async fn credential_check_runs_before_complexity_check() {
        // A weak password with bad credentials reports the credential
        // failure, not the complexity failure.
        let pipeline = pipeline(Behavior::Reject, JitOptions::default());
        let result = pipeline
            .run(&request("weak"), &CancellationToken::new())
            .await;
        assert_eq!(result.title.as_deref(), Some("Authentication Failed"));
    }

    #[tokio::test]
    async fn validator_error_fails_closed_with_generic_message() {
        let pipeline = pipeline(Behavior::Fail, JitOptions::default());
        let result = pipeline
            .run(&request("Abcdef1!"), &CancellationToken::new())
            .await;
        assert_eq!(result.action, MigrationAction::Block);
        assert_eq!(result.title.as_deref(), Some("System Error"));
        // Internal detail never leaks into the user-facing message.
        assert!(!result.message.unwrap().contains("unreachable"));
    }

    #[tokio::test]
    async fn exceeding_the_latency_budget_fails_closed() {
        let options = JitOptions {
            timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let pipeline = pipeline(Behavior::Hang, options);
        let started = Instant::now();
        let result = pipeline
            .run(&request("Abcdef1!"), &CancellationToken::new())
            .await;
        assert_eq!(result.action, MigrationAction::Block);
        assert_eq!(result.title.as_deref(), Some("System Error"));
        // The failure path still answers within the budget's order of
        // magnitude, never hangs.
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn cancelled_event_fails_closed() {
        let pipeline = pipeline(Behavior::Accept, JitOptions::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = pipeline.run(&request("Abcdef1!"), &cancel).await;
        assert_eq!(result.action, MigrationAction::Block);
    }

    #[tokio::test]
    async fn test_mode_skips_legacy_validation_only() {
        let options = JitOptions {
            test_mode: true,
            ..Default::default()
        };
        // The validator would fail, but test mode never calls it.
        let pipeline = pipeline(Behavior::Fail, options);

        let ok = pipeline
            .run(&request("Abcdef1!"), &CancellationToken::new())
            .await;
        assert_eq!(ok.action, MigrationAction::MigratePassword);

        // Complexity validation still applies in test mode.
        let weak = pipeline
            .run(&request("abcdefgh"), &CancellationToken::new())
            .await;
        assert_eq!(weak.action, MigrationAction::Block);
    }
}
