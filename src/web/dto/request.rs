//! Request DTOs.

use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use super::validation::not_empty_trimmed;

/// Login request, shared by every role.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(max = 64), custom(function = "not_empty_trimmed"))]
    #[schema(example = "arjun.k")]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    #[schema(example = "password123")]
    pub password: String,
}

/// Start a password reset by requesting an OTP.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ForgotPasswordRequest {
    #[validate(length(max = 64), custom(function = "not_empty_trimmed"))]
    pub username: String,
}

/// Log in with a previously issued OTP.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct VerifyOtpRequest {
    #[validate(length(max = 64), custom(function = "not_empty_trimmed"))]
    pub username: String,
    #[validate(length(min = 1, max = 16))]
    #[schema(example = "483920")]
    pub otp: String,
}

/// Change the caller's password, authorized by an OTP.
///
/// Password policy is checked by the account service so the error matches
/// every other path that sets a password.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, max = 16))]
    pub otp: String,
    #[validate(length(min = 1))]
    pub new_password: String,
}
