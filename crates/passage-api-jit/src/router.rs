//! Router and state for the sign-in event webhook.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;

use passage_jit::{JitMigrationPipeline, PrivateKeyCache};

use crate::handlers;

/// Shared state for the webhook routes.
#[derive(Clone)]
pub struct JitApiState {
    pub pipeline: Arc<JitMigrationPipeline>,
    pub key_cache: Arc<PrivateKeyCache>,
    /// Domain of the legacy tenant, applied to the event's principal name
    /// before legacy validation.
    pub legacy_tenant_domain: String,
}

impl JitApiState {
    #[must_use]
    pub fn new(
        pipeline: Arc<JitMigrationPipeline>,
        key_cache: Arc<PrivateKeyCache>,
        legacy_tenant_domain: impl Into<String>,
    ) -> Self {
        Self {
            pipeline,
            key_cache,
            legacy_tenant_domain: legacy_tenant_domain.into(),
        }
    }
}

/// Creates the webhook router.
///
/// - `GET  /` — readiness acknowledgment for endpoint registration checks
/// - `POST /` — the password-submit event
pub fn jit_router(state: JitApiState) -> Router {
    Router::new()
        .route(
            "/",
            get(handlers::readiness).post(handlers::password_submit),
        )
        .with_state(state)
}
