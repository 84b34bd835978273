//! Handlers behind the role guards.

use axum::{extract::State, Extension, Json};
use std::sync::Arc;

use super::AppState;
use crate::db::SchoolRepository;
use crate::web::dto::{ApiResponse, ContextResponse, SchoolResponse};
use crate::web::error::ApiError;
use crate::web::middleware::{CurrentUser, VerifiedSchool};

/// GET /chankya/profile - Caller identity, any role.
#[utoipa::path(
    get,
    path = "/chankya/profile",
    tag = "context",
    responses(
        (status = 200, description = "Caller identity", body = ContextResponse),
        (status = 401, description = "Authentication required")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn profile(CurrentUser(user): CurrentUser) -> Json<ApiResponse<ContextResponse>> {
    Json(ApiResponse::new(ContextResponse::from(user)))
}

/// GET /chankya/staff/context - Caller identity, staff only.
#[utoipa::path(
    get,
    path = "/chankya/staff/context",
    tag = "context",
    responses(
        (status = 200, description = "Staff identity", body = ContextResponse),
        (status = 401, description = "Authentication required"),
        (status = 403, description = "Access denied")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn staff_context(CurrentUser(user): CurrentUser) -> Json<ApiResponse<ContextResponse>> {
    Json(ApiResponse::new(ContextResponse::from(user)))
}

/// GET /admin/schools/:school_id - School owned by the calling principal.
#[utoipa::path(
    get,
    path = "/admin/schools/{school_id}",
    tag = "admin",
    params(
        ("school_id" = String, Path, description = "School ID")
    ),
    responses(
        (status = 200, description = "School summary", body = SchoolResponse),
        (status = 401, description = "Authentication required"),
        (status = 403, description = "Access denied or not this principal's school"),
        (status = 404, description = "School not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn school_summary(
    State(state): State<Arc<AppState>>,
    Extension(VerifiedSchool(school_id)): Extension<VerifiedSchool>,
) -> Result<Json<ApiResponse<SchoolResponse>>, ApiError> {
    let school = SchoolRepository::new(state.db.pool())
        .get_by_id(&school_id)
        .await?
        .ok_or_else(|| ApiError::not_found("School not found"))?;

    Ok(Json(ApiResponse::new(SchoolResponse::from(school))))
}
