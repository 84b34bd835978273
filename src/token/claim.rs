//! Identity claims carried inside tokens.
//!
//! Two payload shapes exist on the wire and both must keep working:
//!
//! - bare: `{"id": "<subject>", "timestamp": <ms>}`
//! - full: `{"id": {"id": "<subject>", "role": "...", "username": "...", "school_id": "..."}, "timestamp": <ms>}`
//!
//! [`TokenSubject`] models them as one sum type and [`TokenSubject::from_payload`]
//! is the single place that tells them apart.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::TokenError;
use crate::db::Role;

/// Full identity claim embedded as the `id` object of a token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullClaim {
    /// Subject (account) identifier.
    pub id: String,
    /// Account role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Login name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// School the account belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_id: Option<String>,
}

impl FullClaim {
    /// Create a claim for a subject with a role.
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role: Some(role),
            username: None,
            school_id: None,
        }
    }

    /// Set the username.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the school ID.
    pub fn with_school_id(mut self, school_id: impl Into<String>) -> Self {
        self.school_id = Some(school_id.into());
        self
    }
}

/// What a token identifies: either a bare subject ID (legacy) or a full claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TokenSubject {
    /// Legacy shape: only the subject identifier.
    Bare(String),
    /// Full claim with role, username and school.
    Full(FullClaim),
}

impl From<FullClaim> for TokenSubject {
    fn from(claim: FullClaim) -> Self {
        TokenSubject::Full(claim)
    }
}

impl From<String> for TokenSubject {
    fn from(id: String) -> Self {
        TokenSubject::Bare(id)
    }
}

impl From<&str> for TokenSubject {
    fn from(id: &str) -> Self {
        TokenSubject::Bare(id.to_string())
    }
}

/// Token payload as serialized before encryption.
#[derive(Debug, Serialize)]
pub(crate) struct TokenPayload<'a> {
    pub id: &'a TokenSubject,
    /// Issue time in milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl TokenSubject {
    /// Normalize a decoded payload into a subject.
    ///
    /// An `id` object carrying its own non-empty `id` is a full claim; a non-empty
    /// string (or number) `id` is a bare subject. Everything else is rejected.
    pub fn from_payload(payload: &Value) -> Result<Self, TokenError> {
        let raw = payload.get("id").ok_or(TokenError::InvalidToken)?;

        match raw {
            Value::Object(obj) => {
                let id = obj
                    .get("id")
                    .and_then(scalar_id)
                    .ok_or(TokenError::InvalidToken)?;
                let role = match obj.get("role") {
                    None | Some(Value::Null) => None,
                    Some(Value::String(s)) => {
                        Some(s.parse::<Role>().map_err(|_| TokenError::InvalidToken)?)
                    }
                    Some(_) => return Err(TokenError::InvalidToken),
                };

                Ok(TokenSubject::Full(FullClaim {
                    id,
                    role,
                    username: optional_string(obj.get("username")),
                    school_id: obj.get("school_id").and_then(scalar_id),
                }))
            }
            other => scalar_id(other)
                .map(TokenSubject::Bare)
                .ok_or(TokenError::InvalidToken),
        }
    }

    /// Subject identifier.
    pub fn subject_id(&self) -> &str {
        match self {
            TokenSubject::Bare(id) => id,
            TokenSubject::Full(claim) => &claim.id,
        }
    }
}

/// Read a non-empty identifier from a string or number value.
fn scalar_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn optional_string(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    }
}

/// Identity recovered from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    /// Subject (account) identifier; never empty.
    pub subject_id: String,
    /// Role, absent for bare legacy tokens.
    pub role: Option<Role>,
    /// Login name.
    pub username: Option<String>,
    /// School ID from the claim.
    pub school_id: Option<String>,
    /// Issue time in milliseconds since the Unix epoch, when recorded.
    pub issued_at: Option<i64>,
}

impl VerifiedIdentity {
    pub(crate) fn from_subject(subject: TokenSubject, issued_at: Option<i64>) -> Self {
        match subject {
            TokenSubject::Bare(subject_id) => Self {
                subject_id,
                role: None,
                username: None,
                school_id: None,
                issued_at,
            },
            TokenSubject::Full(claim) => Self {
                subject_id: claim.id,
                role: claim.role,
                username: claim.username,
                school_id: claim.school_id,
                issued_at,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bare_string_id() {
        let subject = TokenSubject::from_payload(&json!({"id": "abc123", "timestamp": 1})).unwrap();
        assert_eq!(subject, TokenSubject::Bare("abc123".to_string()));
    }

    #[test]
    fn test_bare_numeric_id() {
        let subject = TokenSubject::from_payload(&json!({"id": 42})).unwrap();
        assert_eq!(subject, TokenSubject::Bare("42".to_string()));
    }

    #[test]
    fn test_full_claim() {
        let payload = json!({
            "id": {"id": "p1", "role": "principal", "username": "head", "school_id": "s1"},
            "timestamp": 1700000000000i64
        });
        let subject = TokenSubject::from_payload(&payload).unwrap();

        assert_eq!(
            subject,
            TokenSubject::Full(
                FullClaim::new("p1", Role::Principal)
                    .with_username("head")
                    .with_school_id("s1")
            )
        );
        assert_eq!(subject.subject_id(), "p1");
    }

    #[test]
    fn test_full_claim_without_role() {
        let subject = TokenSubject::from_payload(&json!({"id": {"id": "x"}})).unwrap();
        match subject {
            TokenSubject::Full(claim) => {
                assert_eq!(claim.id, "x");
                assert!(claim.role.is_none());
            }
            other => panic!("expected full claim, got {other:?}"),
        }
    }

    #[test]
    fn test_object_without_nested_id_is_rejected() {
        let result = TokenSubject::from_payload(&json!({"id": {"role": "staff"}}));
        assert!(matches!(result, Err(TokenError::InvalidToken)));
    }

    #[test]
    fn test_missing_or_empty_id_is_rejected() {
        assert!(TokenSubject::from_payload(&json!({"timestamp": 1})).is_err());
        assert!(TokenSubject::from_payload(&json!({"id": ""})).is_err());
        assert!(TokenSubject::from_payload(&json!({"id": null})).is_err());
        assert!(TokenSubject::from_payload(&json!({"id": {"id": ""}})).is_err());
        assert!(TokenSubject::from_payload(&json!({"id": [1, 2]})).is_err());
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let result = TokenSubject::from_payload(&json!({"id": {"id": "x", "role": "janitor"}}));
        assert!(matches!(result, Err(TokenError::InvalidToken)));
    }

    #[test]
    fn test_serialize_shapes() {
        let bare = TokenSubject::from("abc");
        assert_eq!(serde_json::to_value(&bare).unwrap(), json!("abc"));

        let full = TokenSubject::from(FullClaim::new("s9", Role::Student).with_username("kid"));
        assert_eq!(
            serde_json::to_value(&full).unwrap(),
            json!({"id": "s9", "role": "student", "username": "kid"})
        );
    }

    #[test]
    fn test_verified_identity_from_bare() {
        let identity = VerifiedIdentity::from_subject(TokenSubject::from("abc"), Some(5));
        assert_eq!(identity.subject_id, "abc");
        assert!(identity.role.is_none());
        assert!(identity.username.is_none());
        assert_eq!(identity.issued_at, Some(5));
    }
}
