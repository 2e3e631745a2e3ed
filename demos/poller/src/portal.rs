//! In-process stand-ins for the remote portal and its token endpoint.

use std::{
    sync::atomic::{AtomicU32, AtomicU64, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use turnstile_session::{Authenticator, Grant, SessionError, TokenError, TokenSource};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub generation: u64,
}

/// Portal that forgets a session after `lifetime` probes.
#[derive(Debug)]
pub struct SimulatedPortal {
    lifetime: u32,
    generation: AtomicU64,
    probes_left: AtomicU32,
}

impl SimulatedPortal {
    pub fn new(lifetime: u32) -> Self {
        Self {
            lifetime,
            generation: AtomicU64::new(0),
            probes_left: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl Authenticator for SimulatedPortal {
    type Session = Session;

    async fn probe(&self, session: &Session) -> Result<bool, SessionError> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        if session.generation != self.generation.load(Ordering::SeqCst) {
            return Ok(false);
        }
        let left = self
            .probes_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        Ok(left.is_ok())
    }

    async fn login(&self) -> Result<Session, SessionError> {
        tokio::time::sleep(Duration::from_millis(150)).await;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.probes_left.store(self.lifetime, Ordering::SeqCst);
        Ok(Session { generation })
    }
}

/// Token endpoint that answers "busy" to every third request.
#[derive(Debug, Default)]
pub struct SimulatedTokenEndpoint {
    requests: AtomicU32,
}

#[async_trait]
impl TokenSource for SimulatedTokenEndpoint {
    async fn fetch(&self) -> Result<Grant, TokenError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let n = self.requests.fetch_add(1, Ordering::SeqCst) + 1;
        if n % 3 == 0 {
            return Err(TokenError::Busy);
        }
        Ok(Grant::new(format!("token-{n}"), Duration::from_secs(30)))
    }
}
