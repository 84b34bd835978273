//! Middleware for the HTTP API.

pub mod auth;
pub mod authorize;
pub mod cors;
pub mod rate_limit;
pub mod security;

pub use auth::{authenticate, AuthContext, CurrentUser};
pub use authorize::{authorize, RoleGuard, VerifiedSchool};
pub use cors::create_cors_layer;
pub use rate_limit::{auth_rate_limit, RateLimitState};
pub use security::security_headers;
