//! Account security: failed-login lockout and one-time passwords.
//!
//! [`state`] holds the pure rules, [`service`] applies them to stored
//! accounts without lost updates.

mod notifier;
mod service;
mod state;

pub use notifier::{LogOtpNotifier, OtpNotifier};
pub use service::AccountSecurityService;
pub use state::{generate_otp, SecurityPolicy, SecurityState};

use thiserror::Error;

use crate::auth::PasswordError;
use crate::SchoolgateError;

/// Errors from login and OTP flows.
#[derive(Error, Debug)]
pub enum AccountError {
    /// No account with the given identifier.
    #[error("account not found")]
    NotFound,

    /// Wrong username or password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Account is locked after too many failed logins.
    #[error("account is blocked")]
    Blocked,

    /// OTP validity window has passed.
    #[error("OTP expired")]
    Expired,

    /// OTP attempt cap reached.
    #[error("too many OTP attempts")]
    TooManyAttempts,

    /// OTP does not match or none is active.
    #[error("invalid OTP")]
    InvalidCode,

    /// New password rejected or hashing failed.
    #[error(transparent)]
    Password(#[from] PasswordError),

    /// Storage or delivery failure.
    #[error(transparent)]
    Internal(#[from] SchoolgateError),
}
