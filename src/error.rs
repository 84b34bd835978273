//! Error types for schoolgate.

use thiserror::Error;

/// Common error type for schoolgate.
#[derive(Error, Debug)]
pub enum SchoolgateError {
    /// Database error.
    ///
    /// Errors from sqlx are converted into this variant with their message preserved.
    #[error("database error: {0}")]
    Database(String),

    /// Database connection error.
    #[error("database connection error: {0}")]
    DatabaseConnection(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Token codec error.
    #[error("token error: {0}")]
    Token(#[from] crate::token::TokenError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for SchoolgateError {
    fn from(e: sqlx::Error) -> Self {
        SchoolgateError::Database(e.to_string())
    }
}

/// Result type alias for schoolgate operations.
pub type Result<T> = std::result::Result<T, SchoolgateError>;
