//! Response DTOs.

use serde::Serialize;
use utoipa::ToSchema;

use crate::db::{Account, Role, School};
use crate::web::middleware::AuthContext;

/// Success envelope: `{"success": true, "data": ...}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Always true.
    pub success: bool,
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new API response.
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Account details safe to return to the account holder.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AccountSummary {
    pub id: String,
    #[schema(value_type = String, example = "student")]
    pub role: Role,
    pub school_id: String,
    pub username: String,
    pub name: String,
    pub email: Option<String>,
    pub last_login_at: Option<String>,
}

impl From<&Account> for AccountSummary {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.clone(),
            role: account.role,
            school_id: account.school_id.clone(),
            username: account.username.clone(),
            name: account.name.clone(),
            email: account.email.clone(),
            last_login_at: account.last_login_at.clone(),
        }
    }
}

/// Successful login or OTP verification.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoginResponse {
    /// Bearer token.
    pub token: String,
    pub user: AccountSummary,
}

/// Identity attached to the request by the auth middleware.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ContextResponse {
    pub subject_id: String,
    #[schema(value_type = Option<String>)]
    pub role: Option<Role>,
    pub username: Option<String>,
    pub school_id: Option<String>,
}

impl From<AuthContext> for ContextResponse {
    fn from(context: AuthContext) -> Self {
        Self {
            subject_id: context.subject_id,
            role: context.role,
            username: context.username,
            school_id: context.school_id,
        }
    }
}

/// School summary.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SchoolResponse {
    pub id: String,
    pub name: String,
    pub created_at: String,
}

impl From<School> for SchoolResponse {
    fn from(school: School) -> Self {
        Self {
            id: school.id,
            name: school.name,
            created_at: school.created_at,
        }
    }
}

/// Plain acknowledgement.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    /// Create a new message response.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Liveness probe.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
    pub version: String,
}
