//! OpenAPI document.

use utoipa::OpenApi;

use super::dto::{
    AccountSummary, ChangePasswordRequest, ContextResponse, ForgotPasswordRequest,
    HealthResponse, LoginRequest, LoginResponse, MessageResponse, SchoolResponse,
    VerifyOtpRequest,
};
use super::handlers::{auth, context};

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::student_login,
        auth::staff_login,
        auth::principal_login,
        auth::forgot_password,
        auth::verify_otp,
        auth::change_password,
        auth::logout,
        auth::me,
        context::profile,
        context::staff_context,
        context::school_summary,
    ),
    components(
        schemas(
            LoginRequest,
            ForgotPasswordRequest,
            VerifyOtpRequest,
            ChangePasswordRequest,
            AccountSummary,
            LoginResponse,
            ContextResponse,
            SchoolResponse,
            MessageResponse,
            HealthResponse,
        )
    ),
    tags(
        (name = "auth", description = "Login, one-time passwords and logout"),
        (name = "context", description = "Identity seen by guarded routes"),
        (name = "admin", description = "Principal-only school routes"),
    )
)]
struct ApiDoc;

/// Build the OpenAPI document.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_auth_routes() {
        let doc = openapi();
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/chankya/auth/student/login"));
        assert!(paths.contains_key("/admin/auth/login"));
        assert!(paths.contains_key("/admin/schools/{school_id}"));
    }
}
