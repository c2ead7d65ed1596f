// Bearer token sessions.
//
// Each token is bound to the client fingerprint it was issued to. It stays
// valid until its idle deadline; a refresh pushes the idle deadline out by
// the idle window but never past the hard expiry fixed at issuance.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;

use super::clock::Clock;
use super::crypto::generate_token_key;
use super::user::Principal;

pub const DEFAULT_IDLE_WINDOW: u64 = 60 * 60; // 1 hour
pub const DEFAULT_HARD_WINDOW: u64 = 10 * 60 * 60; // 10 hours

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("no such session")]
    NotFound,
    #[error("session was issued to a different client")]
    FingerprintMismatch,
    #[error("session expired")]
    Expired,
}

#[derive(Debug, Clone)]
pub struct SessionDetails {
    pub key: String,
    pub principal: Principal,
    pub client_fingerprint: String,
    pub idle_deadline: u64,
    pub hard_expiry: u64,
}

impl SessionDetails {
    fn check(&self, client_fingerprint: &str, now: u64) -> Result<(), SessionError> {
        if self.client_fingerprint != client_fingerprint {
            return Err(SessionError::FingerprintMismatch);
        }
        if now > self.idle_deadline {
            return Err(SessionError::Expired);
        }
        Ok(())
    }

    fn refresh(&mut self, now: u64, idle_window: u64) {
        self.idle_deadline = now.saturating_add(idle_window).min(self.hard_expiry);
    }
}

pub struct SessionManager {
    sessions: DashMap<String, SessionDetails>,
    clock: Arc<dyn Clock>,
    idle_window: u64,
    hard_window: u64,
}

impl SessionManager {
    pub fn new(clock: Arc<dyn Clock>, idle_window: u64, hard_window: u64) -> Self {
        Self {
            sessions: DashMap::new(),
            clock,
            idle_window,
            hard_window,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Creates a session for `principal` under a fresh random key.
    pub fn issue(&self, principal: Principal, client_fingerprint: &str) -> SessionDetails {
        self.purge_expired();
        let now = self.clock.now();
        loop {
            let key = generate_token_key();
            if let Entry::Vacant(slot) = self.sessions.entry(key.clone()) {
                let session = SessionDetails {
                    key,
                    principal,
                    client_fingerprint: client_fingerprint.to_string(),
                    idle_deadline: now.saturating_add(self.idle_window),
                    hard_expiry: now.saturating_add(self.hard_window),
                };
                slot.insert(session.clone());
                log::debug!("issued session for {}", session.principal.userid());
                return session;
            }
            log::warn!("session key collision, generating another");
        }
    }

    pub fn resolve(&self, key: &str, client_fingerprint: &str) -> Result<SessionDetails, SessionError> {
        let session = self.sessions.get(key).ok_or(SessionError::NotFound)?;
        session.check(client_fingerprint, self.clock.now())?;
        Ok(session.value().clone())
    }

    /// Extends the idle deadline, capped at the hard expiry.
    pub fn refresh(&self, key: &str) -> Result<SessionDetails, SessionError> {
        let mut session = self.sessions.get_mut(key).ok_or(SessionError::NotFound)?;
        session.refresh(self.clock.now(), self.idle_window);
        Ok(session.value().clone())
    }

    /// `resolve` followed by `refresh`, done while holding the entry lock.
    pub fn resolve_and_refresh(
        &self,
        key: &str,
        client_fingerprint: &str,
    ) -> Result<SessionDetails, SessionError> {
        let mut session = self.sessions.get_mut(key).ok_or(SessionError::NotFound)?;
        let now = self.clock.now();
        session.check(client_fingerprint, now)?;
        session.refresh(now, self.idle_window);
        Ok(session.value().clone())
    }

    pub fn revoke(&self, key: &str) -> Option<SessionDetails> {
        self.sessions.remove(key).map(|(_, session)| session)
    }

    /// Drops every session whose idle deadline has passed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.sessions.len();
        self.sessions.retain(|_, session| now <= session.idle_deadline);
        let purged = before.saturating_sub(self.sessions.len());
        if purged > 0 {
            log::debug!("purged {} expired sessions", purged);
        }
        purged
    }
}
