//! schoolgate - authentication and authorization for a school management backend
//!
//! Issues and verifies cipher tokens, guards routes by role and school
//! ownership, and enforces failed-login lockout and one-time password limits
//! on student, staff and principal accounts.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod security;
pub mod token;
pub mod web;

pub use auth::{hash_password, validate_password, verify_password, PasswordError};
pub use config::Config;
pub use db::{Account, AccountRepository, Database, NewAccount, NewSchool, Role, School, SchoolRepository};
pub use error::{Result, SchoolgateError};
pub use security::{AccountError, AccountSecurityService, OtpNotifier, SecurityPolicy, SecurityState};
pub use token::{TokenError, TokenIssuer, TokenSubject, TokenVerifier, VerifiedIdentity};
pub use web::{create_router, AppState, WebServer};
