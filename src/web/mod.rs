//! HTTP API.
//!
//! Login and OTP endpoints, the two auth middlewares, and a few guarded
//! routes that echo the identity they establish.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::{create_health_router, create_router};
pub use server::WebServer;
