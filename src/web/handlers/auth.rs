//! Authentication handlers: login, OTP flows, logout.

use axum::{extract::State, Json};
use std::sync::Arc;

use super::AppState;
use crate::db::{Account, Role};
use crate::token::FullClaim;
use crate::web::dto::{
    AccountSummary, ApiResponse, ChangePasswordRequest, ContextResponse, ForgotPasswordRequest,
    LoginRequest, LoginResponse, MessageResponse, ValidatedJson, VerifyOtpRequest,
};
use crate::web::error::ApiError;
use crate::web::middleware::CurrentUser;

/// Mint a full-claim token for an account.
fn issue_for(state: &AppState, account: &Account) -> Result<LoginResponse, ApiError> {
    let claim = FullClaim::new(account.id.clone(), account.role)
        .with_username(account.username.clone())
        .with_school_id(account.school_id.clone());

    let token = state.issuer.issue(claim).map_err(|e| {
        tracing::error!("Failed to issue token: {}", e);
        ApiError::internal("Failed to generate token")
    })?;

    Ok(LoginResponse {
        token,
        user: AccountSummary::from(account),
    })
}

async fn login_as(
    state: &AppState,
    role: Role,
    req: LoginRequest,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    let username = req.username.trim();
    let account = state.security.find_by_username(role, username).await?;
    let account = state.security.attempt_login(&account, &req.password).await?;

    Ok(Json(ApiResponse::new(issue_for(state, &account)?)))
}

/// POST /chankya/auth/student/login - Student login.
#[utoipa::path(
    post,
    path = "/chankya/auth/student/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "User is blocked"),
        (status = 404, description = "User not found"),
        (status = 429, description = "Rate limited")
    )
)]
pub async fn student_login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    login_as(&state, Role::Student, req).await
}

/// POST /chankya/auth/staff/login - Staff login.
#[utoipa::path(
    post,
    path = "/chankya/auth/staff/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "User is blocked"),
        (status = 404, description = "User not found"),
        (status = 429, description = "Rate limited")
    )
)]
pub async fn staff_login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    login_as(&state, Role::Staff, req).await
}

/// POST /admin/auth/login - Principal login.
///
/// Usernames are matched case-insensitively.
#[utoipa::path(
    post,
    path = "/admin/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "User is blocked"),
        (status = 404, description = "User not found"),
        (status = 429, description = "Rate limited")
    )
)]
pub async fn principal_login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    login_as(&state, Role::Principal, req).await
}

/// POST /chankya/auth/student/forgot-password - Send a one-time password.
///
/// The code goes to the configured notifier and is never part of the response.
#[utoipa::path(
    post,
    path = "/chankya/auth/student/forgot-password",
    tag = "auth",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "OTP sent", body = MessageResponse),
        (status = 404, description = "User not found")
    )
)]
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<ForgotPasswordRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let account = state
        .security
        .find_by_username(Role::Student, req.username.trim())
        .await?;
    state.security.issue_otp(&account).await?;

    Ok(Json(ApiResponse::new(MessageResponse::new(
        "OTP sent to your registered email",
    ))))
}

/// POST /chankya/auth/student/verify-otp - Log in with a one-time password.
#[utoipa::path(
    post,
    path = "/chankya/auth/student/verify-otp",
    tag = "auth",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "OTP accepted", body = LoginResponse),
        (status = 400, description = "Invalid or expired OTP"),
        (status = 403, description = "User is blocked or too many OTP attempts"),
        (status = 404, description = "User not found")
    )
)]
pub async fn verify_otp(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<VerifyOtpRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    let account = state
        .security
        .find_by_username(Role::Student, req.username.trim())
        .await?;
    state.security.verify_otp(&account, req.otp.trim()).await?;

    tracing::info!(account_id = %account.id, "Student logged in with OTP");
    Ok(Json(ApiResponse::new(issue_for(&state, &account)?)))
}

/// POST /chankya/auth/student/change-password - Set a new password.
///
/// Requires a bearer token and a valid OTP for the caller's account.
#[utoipa::path(
    post,
    path = "/chankya/auth/student/change-password",
    tag = "auth",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Invalid OTP or password rejected"),
        (status = 401, description = "Authentication required"),
        (status = 403, description = "User is blocked or too many OTP attempts")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    // Legacy bare tokens carry no role; they were only ever issued to students.
    if user.role.is_some_and(|role| role != Role::Student) {
        return Err(ApiError::forbidden("Access denied"));
    }

    let account = state
        .security
        .find_by_id(Role::Student, &user.subject_id)
        .await?;
    state
        .security
        .change_password(&account, req.otp.trim(), &req.new_password)
        .await?;

    Ok(Json(ApiResponse::new(MessageResponse::new(
        "Password changed successfully",
    ))))
}

/// POST /chankya/auth/{student,staff}/logout, /admin/auth/logout - Log out.
///
/// Tokens are stateless, so this only acknowledges; the client discards the
/// token.
#[utoipa::path(
    post,
    path = "/chankya/auth/student/logout",
    tag = "auth",
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "Authentication required")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn logout(CurrentUser(user): CurrentUser) -> Json<ApiResponse<MessageResponse>> {
    tracing::info!(subject_id = %user.subject_id, "Logged out");
    Json(ApiResponse::new(MessageResponse::new("Logged out successfully")))
}

/// GET /chankya/auth/me - Identity carried by the bearer token.
#[utoipa::path(
    get,
    path = "/chankya/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current identity", body = ContextResponse),
        (status = 401, description = "Authentication required")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn me(CurrentUser(user): CurrentUser) -> Json<ApiResponse<ContextResponse>> {
    Json(ApiResponse::new(ContextResponse::from(user)))
}
