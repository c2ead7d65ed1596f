// Login challenge check.
//
// The client sends (userid, nonce, seconds) where
// nonce = derive_nonce(userid, derive_digest(userid, password), seconds).
// The server recomputes the nonce from the stored digest and requires the
// claimed time to be within `max_clock_skew_seconds` of its own clock.

use std::sync::Arc;

use thiserror::Error;

use super::clock::Clock;
use super::credentials::CredentialStore;
use super::crypto::{derive_nonce, verify_eq};
use super::user::Principal;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChallengeError {
    #[error("unknown user {0}")]
    UnknownUser(String),
    #[error("nonce does not match")]
    InvalidNonce,
    #[error("claimed time {claimed} is more than {max_skew}s away from server time {now}")]
    ClockSkewExceeded { claimed: i64, now: u64, max_skew: u64 },
}

pub struct NonceValidator {
    credentials: Arc<CredentialStore>,
    clock: Arc<dyn Clock>,
    max_clock_skew_seconds: u64,
}

impl NonceValidator {
    pub fn new(
        credentials: Arc<CredentialStore>,
        clock: Arc<dyn Clock>,
        max_clock_skew_seconds: u64,
    ) -> Self {
        Self {
            credentials,
            clock,
            max_clock_skew_seconds,
        }
    }

    /// Checks that `nonce` was derived from the user's stored digest at
    /// exactly `seconds`.
    pub fn nonce_is_valid_at_time(
        &self,
        userid: &str,
        nonce: &str,
        seconds: i64,
    ) -> Result<(), ChallengeError> {
        let digest = self
            .credentials
            .digest(userid)
            .ok_or_else(|| ChallengeError::UnknownUser(userid.to_string()))?;
        let expected = derive_nonce(userid, &digest, seconds);
        if verify_eq(nonce, &expected) {
            Ok(())
        } else {
            Err(ChallengeError::InvalidNonce)
        }
    }

    /// As `nonce_is_valid_at_time`, and the claimed time must also be close
    /// to the server clock.
    pub fn nonce_is_valid_now(
        &self,
        userid: &str,
        nonce: &str,
        seconds: i64,
    ) -> Result<(), ChallengeError> {
        self.nonce_is_valid_at_time(userid, nonce, seconds)?;
        let now = self.clock.now();
        let now_signed = i64::try_from(now).unwrap_or(i64::MAX);
        if now_signed.abs_diff(seconds) > self.max_clock_skew_seconds {
            return Err(ChallengeError::ClockSkewExceeded {
                claimed: seconds,
                now,
                max_skew: self.max_clock_skew_seconds,
            });
        }
        Ok(())
    }

    /// Runs the full login check and returns the principal to issue a token for.
    pub fn validate(&self, userid: &str, nonce: &str, seconds: i64) -> Result<Principal, ChallengeError> {
        self.nonce_is_valid_now(userid, nonce, seconds)?;
        self.credentials
            .principal(userid)
            .ok_or_else(|| ChallengeError::UnknownUser(userid.to_string()))
    }
}
