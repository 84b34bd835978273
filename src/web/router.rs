//! Router configuration.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::dto::HealthResponse;
use super::handlers::{
    change_password, forgot_password, logout, me, principal_login, profile, school_summary,
    staff_context, staff_login, student_login, verify_otp, AppState,
};
use super::middleware::{
    auth_rate_limit, authenticate, authorize, create_cors_layer, security_headers,
    RateLimitState, RoleGuard,
};
use super::openapi::openapi;
use crate::config::ServerConfig;

/// Create the API router.
///
/// Route groups never stack the two auth middlewares: login and OTP routes
/// are public (optionally rate limited), `authenticate` guards the
/// self-service routes and `authorize` guards the role-specific ones.
pub fn create_router(
    app_state: Arc<AppState>,
    rate_limit: Option<Arc<RateLimitState>>,
    config: &ServerConfig,
) -> Router {
    let verifier = app_state.verifier.clone();
    let pool = app_state.db.pool().clone();

    let mut public_auth_routes = Router::new()
        .route("/chankya/auth/student/login", post(student_login))
        .route("/chankya/auth/staff/login", post(staff_login))
        .route("/admin/auth/login", post(principal_login))
        .route("/chankya/auth/student/forgot-password", post(forgot_password))
        .route("/chankya/auth/student/verify-otp", post(verify_otp));
    if let Some(limiter) = rate_limit {
        public_auth_routes = public_auth_routes
            .route_layer(middleware::from_fn_with_state(limiter, auth_rate_limit));
    }

    let authenticated_routes = Router::new()
        .route("/chankya/auth/student/change-password", post(change_password))
        .route("/chankya/auth/student/logout", post(logout))
        .route("/chankya/auth/staff/logout", post(logout))
        .route("/admin/auth/logout", post(logout))
        .route("/chankya/auth/me", get(me))
        .route_layer(middleware::from_fn_with_state(
            verifier.clone(),
            authenticate,
        ));

    let any_role_routes = Router::new()
        .route("/chankya/profile", get(profile))
        .route_layer(middleware::from_fn_with_state(
            RoleGuard::authenticated(verifier.clone(), pool.clone()),
            authorize,
        ));

    let staff_routes = Router::new()
        .route("/chankya/staff/context", get(staff_context))
        .route_layer(middleware::from_fn_with_state(
            RoleGuard::staff_only(verifier.clone(), pool.clone()),
            authorize,
        ));

    let principal_routes = Router::new()
        .route("/admin/schools/:school_id", get(school_summary))
        .route_layer(middleware::from_fn_with_state(
            RoleGuard::principal_only(verifier, pool),
            authorize,
        ));

    Router::new()
        .merge(public_auth_routes)
        .merge(authenticated_routes)
        .merge(any_role_routes)
        .merge(staff_routes)
        .merge(principal_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(config))
                .layer(middleware::from_fn(security_headers))
                .layer(DefaultBodyLimit::max(config.body_limit_bytes)),
        )
        .with_state(app_state)
}

/// Create the health check and API document router.
pub fn create_health_router() -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api-docs/openapi.json", get(|| async { Json(openapi()) }))
}

/// Health check handler.
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
