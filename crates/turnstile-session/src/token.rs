use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, warn};
use turnstile_core::{Subscribe, WorkerPoolQueue};
use turnstile_model::PoolConfig;

use crate::error::TokenError;

/// Execution timeout of one refresh inside the queue.
pub const REFRESH_TIMEOUT_MS: u64 = 10_000;
/// A token is dropped this long before the expiry the endpoint announced.
pub const EXPIRY_MARGIN: Duration = Duration::from_secs(5);
pub const DEFAULT_BUSY_RETRIES: u32 = 3;

/// Token issued by a [`TokenSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub token: String,
    pub expires_in: Duration,
}

impl Grant {
    pub fn new(token: impl Into<String>, expires_in: Duration) -> Self {
        Self {
            token: token.into(),
            expires_in,
        }
    }
}

#[async_trait]
pub trait TokenSource: Send + Sync + 'static {
    /// Request a new token. [`TokenError::Busy`] means "try again".
    async fn fetch(&self) -> Result<Grant, TokenError>;
}

#[derive(Debug, Clone)]
struct Cached {
    token: String,
    expires_at: Instant,
}

type Slot = Arc<Mutex<Option<Cached>>>;

/// Bearer token cache with queued refresh.
///
/// Refreshes go through a one-worker [`WorkerPoolQueue`]; each one re-checks the cache first,
/// so callers that queued behind a refresh reuse its token.
pub struct AccessToken<S: TokenSource> {
    source: Arc<S>,
    cached: Slot,
    queue: WorkerPoolQueue,
    max_busy_retries: u32,
}

impl<S: TokenSource> AccessToken<S> {
    pub fn new(source: S) -> Result<Self, TokenError> {
        Self::with_subscribers(source, Vec::new())
    }

    pub fn with_subscribers(
        source: S,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Result<Self, TokenError> {
        let queue =
            WorkerPoolQueue::with_subscribers(PoolConfig::new(1, REFRESH_TIMEOUT_MS), subscribers)?;
        Ok(Self {
            source: Arc::new(source),
            cached: Arc::new(Mutex::new(None)),
            queue,
            max_busy_retries: DEFAULT_BUSY_RETRIES,
        })
    }

    pub fn with_max_busy_retries(mut self, retries: u32) -> Self {
        self.max_busy_retries = retries;
        self
    }

    /// Current token, refreshed first if missing or expired.
    pub async fn get(&self) -> Result<String, TokenError> {
        if let Some(token) = valid(&self.cached) {
            return Ok(token);
        }

        let source = Arc::clone(&self.source);
        let cached = Arc::clone(&self.cached);
        let retries = self.max_busy_retries;
        self.queue
            .enqueue(async move {
                if let Some(token) = valid(&cached) {
                    return Ok(token);
                }
                refresh(&*source, &cached, retries).await
            })
            .await
    }

    /// Drop the cached token, e.g. after the remote side rejected it.
    pub fn invalidate(&self) {
        *self.cached.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

fn valid(slot: &Slot) -> Option<String> {
    slot.lock()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
        .filter(|c| Instant::now() < c.expires_at)
        .map(|c| c.token.clone())
}

async fn refresh<S: TokenSource>(
    source: &S,
    slot: &Slot,
    max_busy_retries: u32,
) -> Result<String, TokenError> {
    let mut busy = 0;
    loop {
        let requested = Instant::now();
        match source.fetch().await {
            Ok(grant) => {
                let lifetime = grant.expires_in.saturating_sub(EXPIRY_MARGIN);
                debug!(expires_in_ms = lifetime.as_millis() as u64, "access token refreshed");
                *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(Cached {
                    token: grant.token.clone(),
                    expires_at: requested + lifetime,
                });
                return Ok(grant.token);
            }
            Err(TokenError::Busy) if busy < max_busy_retries => {
                busy += 1;
                warn!(attempt = busy, "token endpoint busy; retrying");
            }
            Err(err) => return Err(err),
        }
    }
}

impl<S: TokenSource> std::fmt::Debug for AccessToken<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("cached", &valid(&self.cached).is_some())
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}
