//! Bazaar Access - Sign-in abuse prevention
//!
//! A sliding-window limiter counts failed sign-ins per key (usually the
//! client IP) and blocks the key once the window fills. [`LoginGuard`]
//! puts the limiter in front of an external credential verifier.
//!
//! ```text
//!   sign_in(key) ──► is_allowed? ──no──► RateLimited { retry_after }
//!                        │yes
//!                        ▼
//!                 CredentialVerifier ──ok──► record_success ──► principal
//!                        │err
//!                        ▼
//!                 record_failed_attempt ──► AuthenticationFailed
//! ```
//!
//! State lives in process memory only. Running several instances behind a
//! load balancer gives each its own counters; sharing them needs an external
//! store.

#![warn(missing_docs)]

pub mod guard;
pub mod limiter;

pub use guard::{CredentialVerifier, LoginGuard, VerifyError};
pub use limiter::{LoginRateLimiter, RateLimitPolicy};
