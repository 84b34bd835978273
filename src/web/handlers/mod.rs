//! HTTP handlers and shared application state.

pub mod auth;
pub mod context;

pub use auth::*;
pub use context::*;

use std::sync::Arc;

use crate::security::{AccountSecurityService, OtpNotifier, SecurityPolicy};
use crate::token::{AesCbcCodec, TokenCodec, TokenIssuer, TokenVerifier};
use crate::Database;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database handle.
    pub db: Database,
    /// Issues tokens on login.
    pub issuer: TokenIssuer,
    /// Verifies bearer tokens.
    pub verifier: TokenVerifier,
    /// Lockout and OTP rules.
    pub security: AccountSecurityService,
}

impl AppState {
    /// Create application state with the AES token codec.
    ///
    /// The key is derived once here and shared by issuer and verifier.
    pub fn new(db: Database, token_secret: &str, policy: SecurityPolicy) -> Self {
        let codec: Arc<dyn TokenCodec> = Arc::new(AesCbcCodec::new(token_secret));
        Self::with_codec(db, codec, policy)
    }

    /// Create application state with a custom token codec.
    pub fn with_codec(db: Database, codec: Arc<dyn TokenCodec>, policy: SecurityPolicy) -> Self {
        let security = AccountSecurityService::new(db.pool().clone(), policy);
        Self {
            issuer: TokenIssuer::new(codec.clone()),
            verifier: TokenVerifier::new(codec),
            security,
            db,
        }
    }

    /// Replace the OTP notifier.
    pub fn with_notifier(mut self, notifier: Arc<dyn OtpNotifier>) -> Self {
        self.security = self.security.with_notifier(notifier);
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("db", &self.db)
            .field("security", &self.security)
            .finish_non_exhaustive()
    }
}
