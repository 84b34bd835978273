//! Token verification.

use std::sync::Arc;

use serde_json::Value;

use super::claim::{TokenSubject, VerifiedIdentity};
use super::{TokenCodec, TokenError};

/// Recovers identities from tokens, accepting both bare and full claim shapes.
#[derive(Clone)]
pub struct TokenVerifier {
    codec: Arc<dyn TokenCodec>,
}

impl TokenVerifier {
    /// Create a verifier over a codec.
    pub fn new(codec: Arc<dyn TokenCodec>) -> Self {
        Self { codec }
    }

    /// Decode a token and normalize its claim.
    ///
    /// Any failure, whether in the codec, the JSON or the claim shape, is reported
    /// as [`TokenError::InvalidToken`]. The underlying cause is only logged.
    pub fn verify(&self, token: &str) -> Result<VerifiedIdentity, TokenError> {
        let plaintext = self.codec.decode(token).map_err(|e| {
            tracing::debug!(error = %e, "Token decode failed");
            TokenError::InvalidToken
        })?;

        let payload: Value = serde_json::from_str(&plaintext).map_err(|e| {
            tracing::debug!(error = %e, "Token payload is not JSON");
            TokenError::InvalidToken
        })?;

        let subject = TokenSubject::from_payload(&payload)?;
        let issued_at = payload.get("timestamp").and_then(Value::as_i64);

        Ok(VerifiedIdentity::from_subject(subject, issued_at))
    }
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Role;
    use crate::token::{AesCbcCodec, FullClaim, TokenIssuer};

    fn pair(secret: &str) -> (TokenIssuer, TokenVerifier) {
        let codec = Arc::new(AesCbcCodec::new(secret));
        (TokenIssuer::new(codec.clone()), TokenVerifier::new(codec))
    }

    /// Flip one hex digit at `index` to a different hex digit.
    fn flip_hex(token: &str, index: usize) -> String {
        let mut chars: Vec<char> = token.chars().collect();
        chars[index] = if chars[index] == '0' { '1' } else { '0' };
        chars.into_iter().collect()
    }

    #[test]
    fn test_round_trip_full_claim() {
        let (issuer, verifier) = pair("secret");
        let claim = FullClaim::new("staff-7", Role::Staff)
            .with_username("mrao")
            .with_school_id("school-1");

        let identity = verifier.verify(&issuer.issue(claim).unwrap()).unwrap();

        assert_eq!(identity.subject_id, "staff-7");
        assert_eq!(identity.role, Some(Role::Staff));
        assert_eq!(identity.username.as_deref(), Some("mrao"));
        assert_eq!(identity.school_id.as_deref(), Some("school-1"));
        assert!(identity.issued_at.is_some());
    }

    #[test]
    fn test_round_trip_bare_subject() {
        let (issuer, verifier) = pair("secret");

        let identity = verifier.verify(&issuer.issue("legacy-id").unwrap()).unwrap();

        assert_eq!(identity.subject_id, "legacy-id");
        assert_eq!(identity.role, None);
        assert_eq!(identity.username, None);
        assert_eq!(identity.school_id, None);
    }

    #[test]
    fn test_round_trip_every_role() {
        let (issuer, verifier) = pair("secret");
        for role in [Role::Student, Role::Staff, Role::Principal] {
            let identity = verifier
                .verify(&issuer.issue(FullClaim::new("id", role)).unwrap())
                .unwrap();
            assert_eq!(identity.role, Some(role));
        }
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let (issuer, _) = pair("secret-a");
        let (_, verifier) = pair("secret-b");

        let token = issuer.issue(FullClaim::new("x", Role::Student)).unwrap();
        assert!(matches!(
            verifier.verify(&token),
            Err(TokenError::InvalidToken)
        ));
    }

    #[test]
    fn test_tampered_iv_is_rejected() {
        let (issuer, verifier) = pair("secret");
        let token = issuer.issue(FullClaim::new("x", Role::Student)).unwrap();

        // The first IV byte XORs into the leading '{' of the payload
        let tampered = flip_hex(&token, 0);
        assert!(verifier.verify(&tampered).is_err());
    }

    #[test]
    fn test_tampered_ciphertext_is_rejected() {
        let (issuer, verifier) = pair("secret");
        let token = issuer
            .issue(FullClaim::new("x", Role::Principal).with_school_id("school"))
            .unwrap();

        let sep = token.find(':').unwrap();
        for index in [sep + 1, sep + 17, token.len() - 1] {
            let tampered = flip_hex(&token, index);
            assert!(
                verifier.verify(&tampered).is_err(),
                "tampering at {index} was accepted"
            );
        }
    }

    #[test]
    fn test_malformed_token_is_invalid() {
        let (_, verifier) = pair("secret");
        assert!(matches!(
            verifier.verify("no-separator"),
            Err(TokenError::InvalidToken)
        ));
    }

    #[test]
    fn test_non_json_payload_is_invalid() {
        let codec = Arc::new(AesCbcCodec::new("secret"));
        let verifier = TokenVerifier::new(codec.clone());

        let token = codec.encode("not json at all").unwrap();
        assert!(matches!(
            verifier.verify(&token),
            Err(TokenError::InvalidToken)
        ));
    }

    #[test]
    fn test_payload_without_id_is_invalid() {
        let codec = Arc::new(AesCbcCodec::new("secret"));
        let verifier = TokenVerifier::new(codec.clone());

        let token = codec.encode(r#"{"timestamp": 1}"#).unwrap();
        assert!(matches!(
            verifier.verify(&token),
            Err(TokenError::InvalidToken)
        ));
    }

    #[test]
    fn test_nested_legacy_payload_from_other_issuer() {
        // Payload written by hand in the exact shape older servers produced
        let codec = Arc::new(AesCbcCodec::new("secret"));
        let verifier = TokenVerifier::new(codec.clone());

        let token = codec
            .encode(r#"{"id":{"id":"65f0c1","role":"principal","username":"head","school_id":"65f0aa"},"timestamp":1710000000000}"#)
            .unwrap();
        let identity = verifier.verify(&token).unwrap();

        assert_eq!(identity.subject_id, "65f0c1");
        assert_eq!(identity.role, Some(Role::Principal));
        assert_eq!(identity.school_id.as_deref(), Some("65f0aa"));
        assert_eq!(identity.issued_at, Some(1710000000000));
    }
}
