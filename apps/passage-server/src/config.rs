//! Server configuration loaded from environment variables.
//!
//! Loading is fail-fast: a missing required variable or an insecure
//! combination (test mode or inline key material in production) aborts
//! startup with a clear message rather than limping along.

use std::env;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),

    #[error("invalid value for {name}: {detail}")]
    InvalidVar { name: &'static str, detail: String },

    #[error("insecure configuration: {0}")]
    Insecure(String),
}

/// Application environment mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Production,
}

impl std::fmt::Display for AppEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// Where the JIT decryption key comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretsBackend {
    Env,
    File,
}

#[derive(Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub app_env: AppEnvironment,
    pub rust_log: String,

    pub legacy_tenant_id: String,
    pub legacy_tenant_domain: String,
    pub legacy_ropc_client_id: String,
    pub legacy_ropc_scope: String,

    pub jit_test_mode: bool,
    pub jit_key_secret_name: String,
    pub jit_inline_key_pem: Option<String>,

    pub secrets_backend: SecretsBackend,
    pub secrets_dir: Option<String>,
    pub secrets_cache_ttl_secs: u64,
}

impl Config {
    /// Loads and validates configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let app_env = match env::var("APP_ENV").unwrap_or_default().to_lowercase().as_str() {
            "production" | "prod" => AppEnvironment::Production,
            _ => AppEnvironment::Development,
        };

        let port = match env::var("PASSAGE_PORT") {
            Ok(raw) => raw.parse::<u16>().map_err(|e| ConfigError::InvalidVar {
                name: "PASSAGE_PORT",
                detail: e.to_string(),
            })?,
            Err(_) => 8080,
        };

        let jit_test_mode = flag("PASSAGE_JIT_TEST_MODE");
        if jit_test_mode && app_env == AppEnvironment::Production {
            return Err(ConfigError::Insecure(
                "PASSAGE_JIT_TEST_MODE must not be enabled in production".to_string(),
            ));
        }

        let jit_inline_key_pem = env::var("PASSAGE_JIT_INLINE_KEY_PEM")
            .ok()
            .filter(|v| !v.is_empty());
        if jit_inline_key_pem.is_some() && app_env == AppEnvironment::Production {
            return Err(ConfigError::Insecure(
                "PASSAGE_JIT_INLINE_KEY_PEM must not be set in production; \
                 use a secret provider"
                    .to_string(),
            ));
        }

        let secrets_backend = match env::var("PASSAGE_SECRETS_PROVIDER")
            .unwrap_or_else(|_| "env".to_string())
            .to_lowercase()
            .as_str()
        {
            "env" => SecretsBackend::Env,
            "file" => SecretsBackend::File,
            other => {
                return Err(ConfigError::InvalidVar {
                    name: "PASSAGE_SECRETS_PROVIDER",
                    detail: format!("unknown provider '{other}', expected 'env' or 'file'"),
                })
            }
        };
        let secrets_dir = env::var("PASSAGE_SECRETS_DIR").ok();
        if secrets_backend == SecretsBackend::File && secrets_dir.is_none() {
            return Err(ConfigError::MissingVar("PASSAGE_SECRETS_DIR"));
        }

        let secrets_cache_ttl_secs = match env::var("PASSAGE_SECRETS_CACHE_TTL_SECS") {
            Ok(raw) => raw.parse::<u64>().map_err(|e| ConfigError::InvalidVar {
                name: "PASSAGE_SECRETS_CACHE_TTL_SECS",
                detail: e.to_string(),
            })?,
            Err(_) => 300,
        };

        Ok(Self {
            host: env::var("PASSAGE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port,
            app_env,
            rust_log: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            legacy_tenant_id: required("PASSAGE_LEGACY_TENANT_ID")?,
            legacy_tenant_domain: required("PASSAGE_LEGACY_TENANT_DOMAIN")?,
            legacy_ropc_client_id: required("PASSAGE_LEGACY_ROPC_CLIENT_ID")?,
            legacy_ropc_scope: env::var("PASSAGE_LEGACY_ROPC_SCOPE")
                .unwrap_or_else(|_| "openid".to_string()),
            jit_test_mode,
            jit_key_secret_name: env::var("PASSAGE_JIT_KEY_SECRET_NAME")
                .unwrap_or_else(|_| "jit-decryption-key".to_string()),
            jit_inline_key_pem,
            secrets_backend,
            secrets_dir,
            secrets_cache_ttl_secs,
        })
    }

    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingVar(name))
}

fn flag(name: &str) -> bool {
    matches!(
        env::var(name).unwrap_or_default().to_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}
