//! Passage webhook host.
//!
//! Hosts the sign-in event webhook that drives just-in-time password
//! migration. Bulk export/import runs are driven separately through the
//! passage-import library; this process only needs the legacy validator,
//! the decryption key source and the pipeline.

mod config;
mod logging;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use secrecy::SecretString;
use tokio::signal;
use tracing::info;

use config::{Config, SecretsBackend};
use passage_api_jit::{jit_router, JitApiState};
use passage_directory::TenantEndpoints;
use passage_jit::{
    JitMigrationPipeline, JitOptions, PrivateKeyCache, RopcCredentialValidator,
};
use passage_secrets::{CachedSecretProvider, EnvSecretProvider, FileSecretProvider, SecretProvider};

/// The legacy check must finish inside the pipeline budget.
const VALIDATOR_TIMEOUT: Duration = Duration::from_millis(1300);

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("FATAL: {e}");
            std::process::exit(1);
        }
    };

    logging::init_logging(&config.rust_log);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        env = %config.app_env,
        addr = %config.bind_addr(),
        test_mode = config.jit_test_mode,
        "starting passage webhook host"
    );

    // Key material: inline PEM for local runs, otherwise the secret
    // provider behind a TTL cache.
    let key_cache = match &config.jit_inline_key_pem {
        Some(pem) => PrivateKeyCache::from_inline_pem(SecretString::new(pem.clone())),
        None => {
            let inner: Arc<dyn SecretProvider> = match config.secrets_backend {
                SecretsBackend::Env => Arc::new(EnvSecretProvider::default()),
                SecretsBackend::File => {
                    let dir = config.secrets_dir.as_deref().unwrap_or_default();
                    match FileSecretProvider::new(dir) {
                        Ok(p) => Arc::new(p),
                        Err(e) => {
                            eprintln!("FATAL: secret provider unusable: {e}");
                            std::process::exit(1);
                        }
                    }
                }
            };
            let cached = Arc::new(CachedSecretProvider::new(
                inner,
                config.secrets_cache_ttl_secs,
            ));
            // Verify the key exists now; a missing key is a startup error,
            // not a per-request surprise.
            if let Err(e) = cached.get_secret(&config.jit_key_secret_name).await {
                eprintln!(
                    "FATAL: decryption key '{}' unavailable: {e}",
                    config.jit_key_secret_name
                );
                std::process::exit(1);
            }
            PrivateKeyCache::from_provider(cached, config.jit_key_secret_name.clone())
        }
    };

    let legacy_endpoints =
        TenantEndpoints::new(&config.legacy_tenant_id, &config.legacy_tenant_domain);
    let validator = match RopcCredentialValidator::new(
        legacy_endpoints.token_url(),
        &config.legacy_ropc_client_id,
        &config.legacy_ropc_scope,
        VALIDATOR_TIMEOUT,
    ) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("FATAL: failed to build legacy validator: {e}");
            std::process::exit(1);
        }
    };

    let pipeline = JitMigrationPipeline::new(
        Arc::new(validator),
        JitOptions {
            test_mode: config.jit_test_mode,
            ..Default::default()
        },
    );

    let state = JitApiState::new(
        Arc::new(pipeline),
        Arc::new(key_cache),
        config.legacy_tenant_domain.clone(),
    );

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .nest("/events/password-submit", jit_router(state));

    let addr: SocketAddr = match config.bind_addr().parse() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("FATAL: invalid bind address '{}': {e}", config.bind_addr());
            std::process::exit(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("FATAL: failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    };
    info!(%addr, "webhook listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        eprintln!("FATAL: server error: {e}");
        std::process::exit(1);
    }
    info!("shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl+C, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}
