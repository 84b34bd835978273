//! Role-based authorization middleware with the school ownership check.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::{Path, Request, State},
    http::{header::CONTENT_TYPE, HeaderMap},
    middleware::Next,
    response::Response,
};
use serde_json::Value;
use url::form_urlencoded;

use super::auth::{verify_request, AuthContext};
use crate::db::{DbPool, Role, SchoolRepository};
use crate::token::TokenVerifier;
use crate::web::error::ApiError;

/// Largest principal request body buffered to look for a target `school_id`.
const MAX_INSPECTED_BODY: usize = 64 * 1024;

/// School whose ownership by the calling principal was confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSchool(pub String);

/// Allow-list of roles for a route group, plus what it needs to check tokens
/// and school ownership.
#[derive(Clone)]
pub struct RoleGuard {
    allowed: Arc<[Role]>,
    verifier: TokenVerifier,
    pool: DbPool,
}

impl RoleGuard {
    /// Create a guard. An empty allow-list admits every role.
    pub fn new(
        verifier: TokenVerifier,
        pool: DbPool,
        allowed: impl IntoIterator<Item = Role>,
    ) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
            verifier,
            pool,
        }
    }

    /// Principals only.
    pub fn principal_only(verifier: TokenVerifier, pool: DbPool) -> Self {
        Self::new(verifier, pool, [Role::Principal])
    }

    /// Staff only.
    pub fn staff_only(verifier: TokenVerifier, pool: DbPool) -> Self {
        Self::new(verifier, pool, [Role::Staff])
    }

    /// Students only.
    pub fn student_only(verifier: TokenVerifier, pool: DbPool) -> Self {
        Self::new(verifier, pool, [Role::Student])
    }

    /// Principals and staff.
    pub fn principal_or_staff(verifier: TokenVerifier, pool: DbPool) -> Self {
        Self::new(verifier, pool, [Role::Principal, Role::Staff])
    }

    /// Any known role.
    pub fn authenticated(verifier: TokenVerifier, pool: DbPool) -> Self {
        Self::new(verifier, pool, Role::ALL)
    }

    /// Whether `role` passes the allow-list.
    pub fn allows(&self, role: Role) -> bool {
        self.allowed.is_empty() || self.allowed.contains(&role)
    }
}

impl std::fmt::Debug for RoleGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleGuard")
            .field("allowed", &self.allowed)
            .finish_non_exhaustive()
    }
}

/// Authorization middleware.
///
/// 1. verify the bearer token (401 if missing, invalid or without a role)
/// 2. check the role against the guard's allow-list (403)
/// 3. attach an [`AuthContext`] carrying the claimed school ID
/// 4. for principals, collect every `school_id` the request names in the
///    path and in a JSON or form body, and require that they name one school
///    the principal owns (403); the confirmed ID replaces the claimed one and
///    a [`VerifiedSchool`] is attached
///
/// A principal request whose body cannot be inspected is refused.
///
/// Must be installed with `route_layer` so path parameters are available.
pub async fn authorize(
    State(guard): State<RoleGuard>,
    path: Option<Path<HashMap<String, String>>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = verify_request(&guard.verifier, req.headers())?;

    let role = identity.role.ok_or_else(|| {
        tracing::debug!(subject_id = %identity.subject_id, "Token carries no role");
        ApiError::unauthorized("Invalid token")
    })?;

    if !guard.allows(role) {
        tracing::warn!(
            subject_id = %identity.subject_id,
            role = %role,
            "Access denied for role"
        );
        return Err(ApiError::forbidden("Access denied"));
    }

    let claimed_school = identity.school_id.clone();
    let mut context = AuthContext::from_identity(identity, claimed_school);

    let mut req = req;
    if role == Role::Principal {
        let mut targets: Vec<String> = path
            .and_then(|Path(params)| params.get("school_id").cloned())
            .into_iter()
            .collect();
        let (body_targets, restored) = school_ids_from_body(req).await?;
        targets.extend(body_targets);
        req = restored;

        if let Some(school_id) = single_target(targets, &context)? {
            verify_ownership(&guard.pool, &context, &school_id).await?;
            context.school_id = Some(school_id.clone());
            req.extensions_mut().insert(VerifiedSchool(school_id));
        }
    }

    req.extensions_mut().insert(context);
    Ok(next.run(req).await)
}

async fn verify_ownership(
    pool: &DbPool,
    context: &AuthContext,
    school_id: &str,
) -> Result<(), ApiError> {
    let username = context
        .username
        .as_deref()
        .ok_or_else(|| ApiError::forbidden(NO_ACCESS))?;

    let owns = SchoolRepository::new(pool)
        .principal_owns(school_id, username)
        .await?;
    if !owns {
        tracing::warn!(
            subject_id = %context.subject_id,
            username = %username,
            school_id = %school_id,
            "Principal does not own school"
        );
        return Err(ApiError::forbidden(NO_ACCESS));
    }
    Ok(())
}

const NO_ACCESS: &str = "You do not have access to this school";

/// Collapse the named schools to one, refusing requests that name several.
fn single_target(
    mut targets: Vec<String>,
    context: &AuthContext,
) -> Result<Option<String>, ApiError> {
    targets.sort();
    targets.dedup();
    if targets.len() > 1 {
        tracing::warn!(
            subject_id = %context.subject_id,
            schools = ?targets,
            "Request names more than one school"
        );
        return Err(ApiError::forbidden(NO_ACCESS));
    }
    Ok(targets.pop())
}

/// How a request body is read for `school_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyFormat {
    Json,
    Form,
    Opaque,
}

impl BodyFormat {
    /// Classify by media type, ignoring case and parameters.
    ///
    /// `application/json` and any `application/*+json` count as JSON, the
    /// same media types axum's `Json` extractor accepts.
    fn from_headers(headers: &HeaderMap) -> Self {
        let Some(content_type) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
            return Self::Opaque;
        };
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.split_once('/') {
            Some(("application", "x-www-form-urlencoded")) => Self::Form,
            Some(("application", subtype)) if subtype == "json" || subtype.ends_with("+json") => {
                Self::Json
            }
            _ => Self::Opaque,
        }
    }
}

/// Read every `school_id` from the body and hand back an equivalent request.
///
/// Empty bodies name nothing. A non-empty body that is neither JSON nor a
/// form is refused, since the handler may read a school from it.
async fn school_ids_from_body(req: Request) -> Result<(Vec<String>, Request), ApiError> {
    let format = BodyFormat::from_headers(req.headers());

    let (parts, body) = req.into_parts();
    let bytes = to_bytes(body, MAX_INSPECTED_BODY)
        .await
        .map_err(|_| ApiError::bad_request("Request body too large"))?;

    let school_ids = if bytes.is_empty() {
        Vec::new()
    } else {
        match format {
            BodyFormat::Json => school_ids_from_json(&bytes)?,
            BodyFormat::Form => form_urlencoded::parse(&bytes)
                .filter(|(key, _)| key == "school_id")
                .map(|(_, value)| value.into_owned())
                .collect(),
            BodyFormat::Opaque => {
                tracing::warn!(
                    content_type = ?parts.headers.get(CONTENT_TYPE),
                    "Refusing uninspectable principal request body"
                );
                return Err(ApiError::forbidden(NO_ACCESS));
            }
        }
    };

    Ok((school_ids, Request::from_parts(parts, Body::from(bytes))))
}

fn school_ids_from_json(bytes: &[u8]) -> Result<Vec<String>, ApiError> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|_| ApiError::bad_request("Invalid JSON body"))?;

    match value.get("school_id") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(vec![s.clone()]),
        Some(Value::Number(n)) => Ok(vec![n.to_string()]),
        Some(_) => Err(ApiError::forbidden(NO_ACCESS)),
    }
}
