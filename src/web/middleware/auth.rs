//! Token authentication middleware.
//!
//! [`authenticate`] only establishes who the caller is. Role checks live in
//! [`super::authorize`]; a route group uses one or the other, never both.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::db::Role;
use crate::token::{TokenVerifier, VerifiedIdentity};
use crate::web::error::ApiError;

/// Identity attached to an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    /// Subject (account) ID.
    pub subject_id: String,
    /// Role, absent for legacy tokens.
    pub role: Option<Role>,
    /// Login name.
    pub username: Option<String>,
    /// School ID. Only set by the authorization middleware.
    pub school_id: Option<String>,
}

impl AuthContext {
    pub(crate) fn from_identity(identity: VerifiedIdentity, school_id: Option<String>) -> Self {
        Self {
            subject_id: identity.subject_id,
            role: identity.role,
            username: identity.username,
            school_id,
        }
    }
}

/// Extractor for the authenticated caller.
///
/// Fails with 401 when no middleware populated the request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub AuthContext);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// Extract the bearer token from the Authorization header.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Extract and verify the bearer token.
pub(crate) fn verify_request(
    verifier: &TokenVerifier,
    headers: &HeaderMap,
) -> Result<VerifiedIdentity, ApiError> {
    let token =
        bearer_token(headers).ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    verifier.verify(token).map_err(|e| {
        tracing::debug!(error = %e, "Rejected bearer token");
        ApiError::unauthorized("Invalid token")
    })
}

/// Authentication middleware.
///
/// Verifies the bearer token and attaches an [`AuthContext`] without a
/// school ID. No role or expiry check is made.
pub async fn authenticate(
    State(verifier): State<TokenVerifier>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = verify_request(&verifier, req.headers())?;

    let context = AuthContext::from_identity(identity, None);
    tracing::debug!(subject_id = %context.subject_id, "Authenticated request");
    req.extensions_mut().insert(context);

    Ok(next.run(req).await)
}
