//! Round-robin pool of app-registration credentials.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use secrecy::SecretString;
use tracing::{debug, warn};

use crate::config::TenantEndpoints;
use crate::error::{DirectoryError, DirectoryResult};
use crate::token::TokenCache;

/// One app registration usable for directory access.
pub struct AppCredential {
    pub client_id: String,
    pub client_secret: SecretString,
}

impl AppCredential {
    #[must_use]
    pub fn new(client_id: impl Into<String>, client_secret: SecretString) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
        }
    }
}

/// A credential handed out by the pool.
///
/// Cheap to clone; the token cache is shared with the pool so a refreshed
/// token benefits every caller of the same slot.
#[derive(Clone)]
pub struct PooledCredential {
    /// Position of this credential in the pool. Callers report throttling
    /// against this index.
    pub index: usize,
    tokens: Arc<TokenCache>,
}

impl PooledCredential {
    /// Returns a valid access token for this credential.
    pub async fn token(&self) -> DirectoryResult<String> {
        self.tokens.get_token().await
    }

    /// The underlying app registration's client id.
    #[must_use]
    pub fn client_id(&self) -> &str {
        self.tokens.client_id()
    }
}

impl std::fmt::Debug for PooledCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledCredential")
            .field("index", &self.index)
            .field("client_id", &self.client_id())
            .finish()
    }
}

/// Rotation state: the next slot to consider and the per-slot cooldowns.
struct RotationState {
    cursor: usize,
    cooldowns: Vec<Option<Instant>>,
}

/// Rotates among N app-registration credentials, skipping ones that are
/// cooling down after a throttling report.
///
/// Rotation is strict round-robin so load spreads evenly across the
/// credentials' rate-limit buckets. All rotation and cooldown state sits
/// behind a single mutex, making `next()` and `report_throttled()` atomic
/// with respect to each other; the critical sections never block on I/O.
pub struct CredentialPool {
    slots: Vec<Arc<TokenCache>>,
    state: Mutex<RotationState>,
}

impl CredentialPool {
    /// Builds a pool for the given tenant from one or more credentials.
    pub fn new(
        credentials: Vec<AppCredential>,
        endpoints: &TenantEndpoints,
    ) -> DirectoryResult<Self> {
        if credentials.is_empty() {
            return Err(DirectoryError::Config(
                "credential pool requires at least one credential".to_string(),
            ));
        }
        let token_url = endpoints.token_url();
        let scope = endpoints.default_scope();
        let slots: Vec<Arc<TokenCache>> = credentials
            .into_iter()
            .map(|c| {
                Arc::new(TokenCache::new(
                    c.client_id,
                    c.client_secret,
                    token_url.clone(),
                    scope.clone(),
                ))
            })
            .collect();
        let count = slots.len();
        Ok(Self {
            slots,
            state: Mutex::new(RotationState {
                cursor: 0,
                cooldowns: vec![None; count],
            }),
        })
    }

    /// Number of configured credentials.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the next usable credential in rotation order.
    ///
    /// Credentials inside their throttle cooldown are skipped. If every
    /// credential is cooling down, the one whose cooldown expires first is
    /// returned rather than blocking.
    #[must_use]
    pub fn next(&self) -> PooledCredential {
        self.next_at(Instant::now())
    }

    /// Returns a specific credential by index.
    pub fn get(&self, index: usize) -> DirectoryResult<PooledCredential> {
        let tokens = self
            .slots
            .get(index)
            .cloned()
            .ok_or(DirectoryError::CredentialOutOfRange {
                index,
                count: self.slots.len(),
            })?;
        Ok(PooledCredential { index, tokens })
    }

    /// Marks a credential unusable until `retry_after` has elapsed.
    ///
    /// Concurrent reports on the same index keep the longest cooldown; an
    /// existing cooldown is never shortened.
    pub fn report_throttled(&self, index: usize, retry_after: Duration) -> DirectoryResult<()> {
        self.report_throttled_at(index, retry_after, Instant::now())
    }

    fn next_at(&self, now: Instant) -> PooledCredential {
        let mut state = self.lock_state();
        let count = self.slots.len();

        for offset in 0..count {
            let index = (state.cursor + offset) % count;
            let available = state.cooldowns[index].map_or(true, |until| until <= now);
            if available {
                state.cooldowns[index] = None;
                state.cursor = (index + 1) % count;
                return PooledCredential {
                    index,
                    tokens: Arc::clone(&self.slots[index]),
                };
            }
        }

        // Every credential is cooling down. Hand out the one that becomes
        // usable first instead of blocking the caller.
        let index = (0..count)
            .min_by_key(|i| state.cooldowns[*i].unwrap_or(now))
            .unwrap_or(0);
        state.cursor = (index + 1) % count;
        warn!(index, "all credentials throttled, using earliest-expiring");
        PooledCredential {
            index,
            tokens: Arc::clone(&self.slots[index]),
        }
    }

    fn report_throttled_at(
        &self,
        index: usize,
        retry_after: Duration,
        now: Instant,
    ) -> DirectoryResult<()> {
        if index >= self.slots.len() {
            return Err(DirectoryError::CredentialOutOfRange {
                index,
                count: self.slots.len(),
            });
        }
        let until = now + retry_after;
        let mut state = self.lock_state();
        let current = state.cooldowns[index];
        if current.map_or(true, |existing| until > existing) {
            state.cooldowns[index] = Some(until);
            debug!(
                index,
                retry_after_secs = retry_after.as_secs(),
                "credential cooldown recorded"
            );
        }
        Ok(())
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, RotationState> {
        // Cooldown state stays consistent even if a panicking thread held
        // the lock, so a poisoned mutex is recoverable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPool")
            .field("count", &self.slots.len())
            .finish()
    }
}
