//! Token issuance.

use std::sync::Arc;

use chrono::Utc;

use super::claim::{TokenPayload, TokenSubject};
use super::{TokenCodec, TokenError};

/// Mints opaque tokens for identity claims.
///
/// Tokens carry only an issue timestamp; nothing here enforces expiry and nothing
/// is persisted.
#[derive(Clone)]
pub struct TokenIssuer {
    codec: Arc<dyn TokenCodec>,
}

impl TokenIssuer {
    /// Create an issuer over a codec.
    pub fn new(codec: Arc<dyn TokenCodec>) -> Self {
        Self { codec }
    }

    /// Issue a token for a bare subject ID or a full claim.
    pub fn issue(&self, subject: impl Into<TokenSubject>) -> Result<String, TokenError> {
        let subject = subject.into();
        let payload = TokenPayload {
            id: &subject,
            timestamp: Utc::now().timestamp_millis(),
        };
        let json = serde_json::to_string(&payload).map_err(|_| TokenError::InvalidToken)?;

        let token = self.codec.encode(&json)?;
        tracing::debug!(subject_id = %subject.subject_id(), "Issued access token");
        Ok(token)
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer").finish_non_exhaustive()
    }
}
