//! Sign-in guard

use bazaar_common::{MarketError, MarketResult, RepositoryError};
use std::sync::Arc;
use thiserror::Error;

use crate::limiter::LoginRateLimiter;

/// Verifier failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    /// Wrong username or secret
    #[error("invalid credentials")]
    InvalidCredentials,
    /// Verifier backend could not answer
    #[error("credential store unavailable: {0}")]
    Unavailable(String),
}

/// External credential verifier (password hashing, token issuance, ...)
pub trait CredentialVerifier: Send + Sync {
    /// Authenticated identity
    type Principal;

    /// Check a username/secret pair
    fn verify(&self, username: &str, secret: &str) -> Result<Self::Principal, VerifyError>;
}

/// Rate-limited front door for a [`CredentialVerifier`]
pub struct LoginGuard<V> {
    verifier: V,
    limiter: Arc<LoginRateLimiter>,
}

impl<V: CredentialVerifier> LoginGuard<V> {
    /// Wrap a verifier
    pub fn new(verifier: V, limiter: Arc<LoginRateLimiter>) -> Self {
        Self { verifier, limiter }
    }

    /// Shared limiter
    pub fn limiter(&self) -> &Arc<LoginRateLimiter> {
        &self.limiter
    }

    /// Attempt a sign-in from `key`
    ///
    /// Blocked keys are refused before the verifier runs. Backend outages do
    /// not count as failed attempts.
    pub fn sign_in(&self, key: &str, username: &str, secret: &str) -> MarketResult<V::Principal> {
        if !self.limiter.is_allowed(key) {
            let retry_after_secs = self.limiter.seconds_until_unblocked(key);
            tracing::info!(key, retry_after_secs, "sign-in refused while blocked");
            return Err(MarketError::RateLimited { retry_after_secs });
        }

        match self.verifier.verify(username, secret) {
            Ok(principal) => {
                self.limiter.record_success(key);
                Ok(principal)
            }
            Err(VerifyError::InvalidCredentials) => {
                self.limiter.record_failed_attempt(key);
                Err(MarketError::AuthenticationFailed)
            }
            Err(VerifyError::Unavailable(detail)) => {
                Err(RepositoryError::StorageError(detail).into())
            }
        }
    }
}
