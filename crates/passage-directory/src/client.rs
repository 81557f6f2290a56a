//! Directory API client with retry, backoff and credential rotation.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use passage_core::{BatchItemFailure, BatchResult, PagedResult, UserProfile};

use crate::config::{TenantEndpoints, TenantScope};
use crate::credential_pool::CredentialPool;
use crate::error::{DirectoryError, DirectoryResult};
use crate::retry::RetryPolicy;

/// Paginated list response from the directory API.
#[derive(Debug, Deserialize)]
struct ODataList<T> {
    #[serde(default)]
    value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

/// One item response inside a `$batch` reply.
#[derive(Debug, Deserialize)]
struct BatchItemResponse {
    id: String,
    status: u16,
    #[serde(default)]
    body: Value,
}

impl BatchItemResponse {
    fn error_parts(&self) -> (String, String) {
        let code = self
            .body
            .pointer("/error/code")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let message = self
            .body
            .pointer("/error/message")
            .and_then(Value::as_str)
            .unwrap_or("request failed")
            .to_string();
        (code, message)
    }
}

struct RawResponse {
    body: Value,
}

/// Resilient client for one directory tenant.
///
/// Every attempt draws the next credential from the pool, so retries rotate
/// across rate-limit buckets, and every rate-limit response is reported back
/// to the pool before the retry sleep so other operations skip the cooling
/// credential.
pub struct DirectoryClient {
    http: reqwest::Client,
    pool: Arc<CredentialPool>,
    endpoints: TenantEndpoints,
    retry: RetryPolicy,
    scope: TenantScope,
}

impl DirectoryClient {
    /// Builds the client for one logical tenant connection.
    ///
    /// Called explicitly at startup, once per tenant scope.
    pub fn for_tenant(
        pool: Arc<CredentialPool>,
        scope: TenantScope,
        endpoints: TenantEndpoints,
        retry: RetryPolicy,
    ) -> DirectoryResult<Self> {
        retry.validate().map_err(DirectoryError::Config)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DirectoryError::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            pool,
            endpoints,
            retry,
            scope,
        })
    }

    /// The credential pool this client draws from.
    #[must_use]
    pub fn pool(&self) -> &Arc<CredentialPool> {
        &self.pool
    }

    /// Which tenant this client talks to.
    #[must_use]
    pub fn scope(&self) -> TenantScope {
        self.scope
    }

    /// Base URL for API requests.
    #[must_use]
    pub fn base_url(&self) -> String {
        self.endpoints.base_url()
    }

    /// Fetches one page of users.
    ///
    /// The caller drives pagination: pass the returned token back in to get
    /// the next page. The sequence is restartable from any token.
    #[instrument(skip(self, cancel), fields(scope = %self.scope))]
    pub async fn list_users(
        &self,
        page_size: usize,
        select: Option<&str>,
        filter: Option<&str>,
        skip_token: Option<&str>,
        cancel: &CancellationToken,
    ) -> DirectoryResult<PagedResult<UserProfile>> {
        self.with_deadline(async {
            let url = self.build_users_url(page_size, select, filter, skip_token);
            let raw = self.execute(Method::GET, &url, None, cancel).await?;
            let page: ODataList<UserProfile> = serde_json::from_value(raw.body)?;
            Ok(PagedResult::new(
                page.value,
                continuation_token(page.next_link),
            ))
        })
        .await
    }

    /// Creates a single user, returning the profile with its assigned id.
    #[instrument(skip(self, profile, cancel), fields(scope = %self.scope, upn = profile.identifier()))]
    pub async fn create_user(
        &self,
        profile: &UserProfile,
        cancel: &CancellationToken,
    ) -> DirectoryResult<UserProfile> {
        self.with_deadline(async {
            let url = format!("{}/users", self.base_url());
            let body = serde_json::to_value(profile)?;
            match self.execute(Method::POST, &url, Some(&body), cancel).await {
                Ok(raw) => Ok(serde_json::from_value(raw.body)?),
                Err(e) => Err(into_conflict(e)),
            }
        })
        .await
    }

    /// Submits profiles as one logical batch.
    ///
    /// Item outcomes are independent; duplicates are recorded as skipped. If
    /// the service throttles the whole submission past the retry budget, the
    /// result carries `was_throttled` and the suggested wait instead of an
    /// error, so the caller can pace itself and resubmit.
    #[instrument(skip(self, profiles, cancel), fields(scope = %self.scope, count = profiles.len()))]
    pub async fn create_users_batch(
        &self,
        profiles: &[UserProfile],
        cancel: &CancellationToken,
    ) -> DirectoryResult<BatchResult> {
        if profiles.is_empty() {
            return Ok(BatchResult::default());
        }
        self.with_deadline(async {
            let requests: Vec<Value> = profiles
                .iter()
                .enumerate()
                .map(|(i, p)| {
                    Ok(json!({
                        "id": i.to_string(),
                        "method": "POST",
                        "url": "/users",
                        "headers": { "Content-Type": "application/json" },
                        "body": serde_json::to_value(p)?,
                    }))
                })
                .collect::<DirectoryResult<_>>()?;

            let url = format!("{}/$batch", self.base_url());
            let payload = json!({ "requests": requests });
            let raw = match self.execute(Method::POST, &url, Some(&payload), cancel).await {
                Ok(raw) => raw,
                Err(DirectoryError::RateLimited { retry_after_secs }) => {
                    warn!(
                        retry_after_secs,
                        "whole batch throttled past the retry budget"
                    );
                    return Ok(BatchResult::throttled(
                        profiles.len(),
                        Some(Duration::from_secs(retry_after_secs)),
                    ));
                }
                Err(e) => return Err(e),
            };

            let responses: Vec<BatchItemResponse> = serde_json::from_value(
                raw.body
                    .get("responses")
                    .cloned()
                    .unwrap_or_else(|| Value::Array(Vec::new())),
            )?;
            let by_id: HashMap<&str, &BatchItemResponse> =
                responses.iter().map(|r| (r.id.as_str(), r)).collect();

            let mut result = BatchResult {
                total_items: profiles.len(),
                ..Default::default()
            };
            for (i, profile) in profiles.iter().enumerate() {
                let id = i.to_string();
                match by_id.get(id.as_str()) {
                    Some(item) if (200..300).contains(&item.status) => {
                        result.success_count += 1;
                        if let Ok(created) = serde_json::from_value::<UserProfile>(item.body.clone())
                        {
                            result.created_users.push(created);
                        }
                    }
                    Some(item) => {
                        let (code, message) = item.error_parts();
                        if is_conflict(item.status, &code, &message) {
                            result.skipped_count += 1;
                            result.skipped_user_ids.push(profile.identifier().to_string());
                            result.duplicate_users.push(profile.clone());
                        } else {
                            result.failure_count += 1;
                            result.failures.push(BatchItemFailure {
                                index: i,
                                item_id: profile.identifier().to_string(),
                                message,
                                status_code: Some(item.status),
                            });
                        }
                    }
                    None => {
                        result.failure_count += 1;
                        result.failures.push(BatchItemFailure {
                            index: i,
                            item_id: profile.identifier().to_string(),
                            message: "no response returned for batch item".to_string(),
                            status_code: None,
                        });
                    }
                }
            }

            info!(
                total = result.total_items,
                success = result.success_count,
                skipped = result.skipped_count,
                failed = result.failure_count,
                "user batch submitted"
            );
            Ok(result)
        })
        .await
    }

    /// Applies a partial update to a user.
    #[instrument(skip(self, updates, cancel), fields(scope = %self.scope))]
    pub async fn update_user(
        &self,
        user_id: &str,
        updates: &serde_json::Map<String, Value>,
        cancel: &CancellationToken,
    ) -> DirectoryResult<()> {
        self.with_deadline(async {
            let url = format!("{}/users/{}", self.base_url(), user_id);
            let body = Value::Object(updates.clone());
            self.execute(Method::PATCH, &url, Some(&body), cancel)
                .await?;
            Ok(())
        })
        .await
    }

    /// Fetches a user by object id; `Ok(None)` when the user does not exist.
    #[instrument(skip(self, cancel), fields(scope = %self.scope))]
    pub async fn get_user_by_id(
        &self,
        user_id: &str,
        select: Option<&str>,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Option<UserProfile>> {
        self.with_deadline(async {
            let mut url = format!("{}/users/{}", self.base_url(), user_id);
            if let Some(select) = select {
                url.push_str(&format!("?$select={}", urlencoding::encode(select)));
            }
            match self.execute(Method::GET, &url, None, cancel).await {
                Ok(raw) => Ok(Some(serde_json::from_value(raw.body)?)),
                Err(DirectoryError::Api { status: 404, .. }) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
    }

    /// Finds the first user whose extension attribute equals `value`.
    #[instrument(skip(self, value, cancel), fields(scope = %self.scope))]
    pub async fn find_user_by_extension_attribute(
        &self,
        attribute_name: &str,
        value: &str,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Option<UserProfile>> {
        let filter = format!("{} eq '{}'", attribute_name, value.replace('\'', "''"));
        let mut page = self.list_users(1, None, Some(&filter), None, cancel).await?;
        Ok(if page.items.is_empty() {
            None
        } else {
            Some(page.items.swap_remove(0))
        })
    }

    /// Sets a user's password.
    #[instrument(skip(self, password, cancel), fields(scope = %self.scope))]
    pub async fn set_password(
        &self,
        user_id: &str,
        password: &str,
        force_change_on_next_sign_in: bool,
        cancel: &CancellationToken,
    ) -> DirectoryResult<()> {
        self.with_deadline(async {
            let url = format!("{}/users/{}", self.base_url(), user_id);
            let body = json!({
                "passwordProfile": {
                    "password": password,
                    "forceChangePasswordNextSignIn": force_change_on_next_sign_in,
                }
            });
            self.execute(Method::PATCH, &url, Some(&body), cancel)
                .await?;
            Ok(())
        })
        .await
    }

    /// Bounds a logical operation by the policy's overall timeout,
    /// independent of how many retries remain.
    async fn with_deadline<T, F>(&self, operation: F) -> DirectoryResult<T>
    where
        F: Future<Output = DirectoryResult<T>>,
    {
        match tokio::time::timeout(self.retry.operation_timeout, operation).await {
            Ok(result) => result,
            Err(_) => Err(DirectoryError::Timeout {
                timeout_secs: self.retry.operation_timeout.as_secs(),
            }),
        }
    }

    /// The retry loop shared by every operation.
    async fn execute(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        cancel: &CancellationToken,
    ) -> DirectoryResult<RawResponse> {
        let mut attempt: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(DirectoryError::Cancelled);
            }

            let credential = self.pool.next();
            let token = credential.token().await?;

            let mut request = self.http.request(method.clone(), url).bearer_auth(&token);
            if let Some(b) = body {
                request = request.json(b);
            }
            let response = request.send().await?;
            let status = response.status().as_u16();

            if response.status().is_success() {
                let text = response.text().await?;
                let body = if text.trim().is_empty() {
                    Value::Null
                } else {
                    serde_json::from_str(&text)?
                };
                return Ok(RawResponse { body });
            }

            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(RetryPolicy::parse_retry_after);

            if self.retry.is_retryable(status) {
                let delay = self.retry.retry_delay(attempt, retry_after);

                if status == 429 {
                    // Park this credential before retrying so concurrent
                    // rotations skip it for the duration of the hint.
                    let cooldown = retry_after.map_or(delay, Duration::from_secs);
                    self.pool.report_throttled(credential.index, cooldown)?;
                }

                if attempt >= self.retry.max_retries {
                    if status == 429 {
                        return Err(DirectoryError::RateLimited {
                            retry_after_secs: retry_after.unwrap_or_else(|| delay.as_secs()),
                        });
                    }
                    let (code, message) = read_api_error(response).await;
                    return Err(DirectoryError::Api {
                        status,
                        code,
                        message,
                    });
                }

                warn!(
                    status,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    credential = credential.index,
                    "transient directory error, backing off"
                );
                tokio::select! {
                    () = cancel.cancelled() => return Err(DirectoryError::Cancelled),
                    () = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
                continue;
            }

            if status == 401 {
                return Err(DirectoryError::Auth(
                    "directory rejected the access token".to_string(),
                ));
            }

            let (code, message) = read_api_error(response).await;
            return Err(DirectoryError::Api {
                status,
                code,
                message,
            });
        }
    }

    fn build_users_url(
        &self,
        page_size: usize,
        select: Option<&str>,
        filter: Option<&str>,
        skip_token: Option<&str>,
    ) -> String {
        // A token that is a full next-link is used verbatim; that keeps
        // pagination working even when the service returns opaque links.
        if let Some(token) = skip_token {
            if token.starts_with("http://") || token.starts_with("https://") {
                return token.to_string();
            }
        }
        let mut url = format!("{}/users?$top={}", self.base_url(), page_size);
        if let Some(select) = select {
            url.push_str(&format!("&$select={}", urlencoding::encode(select)));
        }
        if let Some(filter) = filter {
            url.push_str(&format!("&$filter={}", urlencoding::encode(filter)));
        }
        if let Some(token) = skip_token {
            url.push_str(&format!("&$skiptoken={}", urlencoding::encode(token)));
        }
        url
    }
}

impl std::fmt::Debug for DirectoryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryClient")
            .field("scope", &self.scope)
            .field("base_url", &self.base_url())
            .finish()
    }
}

/// Reduces a next-link to its skip token where possible, so continuation
/// tokens stay short and storable.
fn continuation_token(next_link: Option<String>) -> Option<String> {
    let link = next_link?;
    match url::Url::parse(&link) {
        Ok(parsed) => parsed
            .query_pairs()
            .find(|(k, _)| k == "$skiptoken")
            .map(|(_, v)| v.into_owned())
            .or(Some(link)),
        Err(_) => Some(link),
    }
}

fn is_conflict(status: u16, code: &str, message: &str) -> bool {
    status == 409
        || code.to_ascii_lowercase().contains("conflict")
        || code.eq_ignore_ascii_case("Request_MultipleObjectsWithSameKeyValue")
        || message.to_ascii_lowercase().contains("already exists")
}

fn into_conflict(error: DirectoryError) -> DirectoryError {
    match error {
        DirectoryError::Api {
            status,
            code,
            message,
        } if is_conflict(status, &code, &message) => DirectoryError::Conflict(message),
        other => other,
    }
}

async fn read_api_error(response: reqwest::Response) -> (String, String) {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<Value>(&text) {
        Ok(v) => {
            let code = v
                .pointer("/error/code")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let message = v
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map_or_else(|| text.clone(), ToString::to_string);
            (code, message)
        }
        Err(_) => (status.to_string(), text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continuation_token_extracts_skiptoken() {
        let link = "https://graph.example/v1.0/users?$top=10&$skiptoken=X%27abc%27".to_string();
        assert_eq!(continuation_token(Some(link)), Some("X'abc'".to_string()));
    }

    #[test]
    fn continuation_token_falls_back_to_full_link() {
        let link = "https://graph.example/v1.0/users?cursor=opaque".to_string();
        assert_eq!(continuation_token(Some(link.clone())), Some(link));
        assert_eq!(continuation_token(None), None);
    }

    #[test]
    fn conflict_classification() {
        assert!(is_conflict(409, "", ""));
        assert!(is_conflict(
            400,
            "Request_BadRequest",
            "Another object with the same value for property userPrincipalName already exists."
        ));
        assert!(is_conflict(
            400,
            "Request_MultipleObjectsWithSameKeyValue",
            ""
        ));
        assert!(!is_conflict(400, "Request_BadRequest", "Invalid value"));
    }

    #[test]
    fn batch_item_error_parts() {
        let item: BatchItemResponse = serde_json::from_value(json!({
            "id": "0",
            "status": 400,
            "body": { "error": { "code": "Request_BadRequest", "message": "nope" } }
        }))
        .unwrap();
        let (code, message) = item.error_parts();
        assert_eq!(code, "Request_BadRequest");
        assert_eq!(message, "nope");
    }
}
