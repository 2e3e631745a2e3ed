use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use tracing::{debug, info, warn};
use turnstile_core::{SingleFlightGate, Subscribe};
use turnstile_model::GateConfig;

use crate::error::SessionError;

/// Logins attempted by one check before giving up.
pub const DEFAULT_MAX_LOGINS: u32 = 5;

/// Remote side of a session: validity check and fresh login.
#[async_trait]
pub trait Authenticator: Send + Sync + 'static {
    type Session: Clone + Send + Sync + 'static;

    /// Returns `Ok(false)` when the portal no longer accepts `session`.
    async fn probe(&self, session: &Self::Session) -> Result<bool, SessionError>;

    async fn login(&self) -> Result<Self::Session, SessionError>;
}

/// Keeps one remote session valid for many concurrent callers.
///
/// Every [`ensure`](SessionGuard::ensure) runs the check-login routine through a
/// [`SingleFlightGate`], so callers arriving while a login is in progress find the fresh
/// session instead of logging in again.
pub struct SessionGuard<A: Authenticator> {
    gate: SingleFlightGate,
    auth: Arc<A>,
    session: Arc<RwLock<Option<A::Session>>>,
    max_logins: u32,
}

impl<A: Authenticator> SessionGuard<A> {
    pub fn new(auth: A, config: GateConfig) -> Result<Self, SessionError> {
        Self::with_subscribers(auth, config, Vec::new())
    }

    pub fn with_subscribers(
        auth: A,
        config: GateConfig,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Result<Self, SessionError> {
        Ok(Self {
            gate: SingleFlightGate::with_subscribers(config, subscribers)?,
            auth: Arc::new(auth),
            session: Arc::new(RwLock::new(None)),
            max_logins: DEFAULT_MAX_LOGINS,
        })
    }

    pub fn with_max_logins(mut self, max_logins: u32) -> Self {
        self.max_logins = max_logins;
        self
    }

    /// Return a session the portal just accepted, logging in if needed.
    pub async fn ensure(&self) -> Result<A::Session, SessionError> {
        let routine = check_login(
            Arc::clone(&self.auth),
            Arc::clone(&self.session),
            self.max_logins,
        );
        self.gate.admit(routine).await
    }

    /// Stored session, without checking it.
    pub fn current(&self) -> Option<A::Session> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Forget the stored session; the next [`ensure`](SessionGuard::ensure) logs in.
    ///
    /// Runs through the gate like any other writer of the session, so it waits for a check
    /// already admitted and cannot clear a session that check is about to store.
    pub async fn invalidate(&self) {
        let slot = Arc::clone(&self.session);
        self.gate
            .admit(async move {
                *slot.write().unwrap_or_else(PoisonError::into_inner) = None;
                debug!("session invalidated");
            })
            .await
    }

    pub fn gate(&self) -> &SingleFlightGate {
        &self.gate
    }
}

async fn check_login<A: Authenticator>(
    auth: Arc<A>,
    slot: Arc<RwLock<Option<A::Session>>>,
    max_logins: u32,
) -> Result<A::Session, SessionError> {
    let mut logins = 0;
    loop {
        let stored = slot.read().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(session) = stored {
            match auth.probe(&session).await {
                Ok(true) => return Ok(session),
                Ok(false) => debug!("session no longer accepted"),
                Err(err) => warn!(error = %err, "session probe failed; logging in again"),
            }
            *slot.write().unwrap_or_else(PoisonError::into_inner) = None;
        }

        if logins >= max_logins {
            return Err(SessionError::Exhausted { logins });
        }
        logins += 1;
        let session = auth.login().await?;
        info!(attempt = logins, "logged in");
        *slot.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
    }
}

impl<A: Authenticator> std::fmt::Debug for SessionGuard<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGuard")
            .field("gate", &self.gate)
            .field("max_logins", &self.max_logins)
            .finish_non_exhaustive()
    }
}
