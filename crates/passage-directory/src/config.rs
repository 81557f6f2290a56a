//! Tenant connection configuration.

use std::fmt;

/// Which side of the migration a client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantScope {
    /// The identity system being migrated away from.
    Legacy,
    /// The identity system being migrated to.
    Replacement,
}

impl fmt::Display for TenantScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => write!(f, "legacy"),
            Self::Replacement => write!(f, "replacement"),
        }
    }
}

/// Endpoints and identity of one directory tenant.
#[derive(Debug, Clone)]
pub struct TenantEndpoints {
    /// Tenant id used in the token endpoint path.
    pub tenant_id: String,
    /// Primary domain of the tenant, used for UPN re-domaining.
    pub tenant_domain: String,
    login_base: String,
    api_base: String,
    api_version: String,
}

impl TenantEndpoints {
    /// Creates endpoints with the public-cloud defaults.
    #[must_use]
    pub fn new(tenant_id: impl Into<String>, tenant_domain: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            tenant_domain: tenant_domain.into(),
            login_base: "https://login.microsoftonline.com".to_string(),
            api_base: "https://graph.microsoft.com".to_string(),
            api_version: "v1.0".to_string(),
        }
    }

    /// Overrides the login authority base URL.
    #[must_use]
    pub fn with_login_base(mut self, base: impl Into<String>) -> Self {
        self.login_base = trim_slash(base.into());
        self
    }

    /// Overrides the directory API base URL.
    #[must_use]
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = trim_slash(base.into());
        self
    }

    /// Overrides the directory API version segment.
    #[must_use]
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Client-credentials token endpoint for this tenant.
    #[must_use]
    pub fn token_url(&self) -> String {
        format!("{}/{}/oauth2/v2.0/token", self.login_base, self.tenant_id)
    }

    /// Default scope requested for app-only tokens.
    #[must_use]
    pub fn default_scope(&self) -> String {
        format!("{}/.default", self.api_base)
    }

    /// Base URL for API requests, including the version segment.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("{}/{}", self.api_base, self.api_version)
    }
}

fn trim_slash(mut s: String) -> String {
    while s.ends_with('/') {
        s.pop();
    }
    s
}
