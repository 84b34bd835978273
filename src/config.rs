//! Configuration module for schoolgate.

use serde::Deserialize;
use std::path::Path;

use crate::security::SecurityPolicy;
use crate::{Result, SchoolgateError};

/// Secret used when none is configured outside production.
pub const FALLBACK_TOKEN_SECRET: &str = "your_aes_secret_key";

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Production mode. Refuses to start without a token secret.
    #[serde(default)]
    pub production: bool,
    /// CORS allowed origins. Empty allows any origin without credentials.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Maximum request body size in bytes.
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_body_limit() -> usize {
    64 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            production: false,
            cors_origins: vec![],
            body_limit_bytes: default_body_limit(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Maximum pooled connections.
    #[serde(default = "default_db_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> String {
    "data/schoolgate.db".to_string()
}

fn default_db_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_db_max_connections(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/schoolgate.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Token and account security configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Secret the token key is derived from.
    #[serde(default)]
    pub token_secret: String,
    /// Failed logins before an account is blocked.
    #[serde(default = "default_max_failed_logins")]
    pub max_failed_logins: u32,
    /// Failed OTP checks before OTP verification is refused.
    #[serde(default = "default_max_otp_attempts")]
    pub max_otp_attempts: u32,
    /// OTP validity in seconds.
    #[serde(default = "default_otp_ttl")]
    pub otp_ttl_secs: u64,
    /// Whether issuing a new OTP resets the attempt counter.
    #[serde(default = "default_reset_otp_attempts")]
    pub reset_otp_attempts_on_issue: bool,
}

fn default_max_failed_logins() -> u32 {
    3
}

fn default_max_otp_attempts() -> u32 {
    3
}

/// Upper bound for the OTP validity window (one day).
const MAX_OTP_TTL_SECS: u64 = 86_400;

fn default_otp_ttl() -> u64 {
    600 // 10 minutes
}

fn default_reset_otp_attempts() -> bool {
    true
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            token_secret: String::new(),
            max_failed_logins: default_max_failed_logins(),
            max_otp_attempts: default_max_otp_attempts(),
            otp_ttl_secs: default_otp_ttl(),
            reset_otp_attempts_on_issue: default_reset_otp_attempts(),
        }
    }
}

impl SecurityConfig {
    /// Build the state machine policy.
    pub fn policy(&self) -> SecurityPolicy {
        SecurityPolicy {
            max_failed_logins: self.max_failed_logins,
            max_otp_attempts: self.max_otp_attempts,
            otp_ttl: chrono::Duration::seconds(self.otp_ttl_secs.min(MAX_OTP_TTL_SECS) as i64),
            reset_otp_attempts_on_issue: self.reset_otp_attempts_on_issue,
        }
    }
}

/// Rate limiting for the authentication endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Whether rate limiting is enabled.
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,
    /// Requests allowed per client IP within one window.
    #[serde(default = "default_rate_limit_requests")]
    pub max_requests: u32,
    /// Window length in seconds.
    #[serde(default = "default_rate_limit_window")]
    pub window_secs: u64,
    /// Key clients by `X-Forwarded-For` / `X-Real-IP`. Enable only behind a
    /// proxy that sets them; otherwise clients can rotate the header.
    #[serde(default)]
    pub trust_forwarded_headers: bool,
}

fn default_rate_limit_enabled() -> bool {
    true
}

fn default_rate_limit_requests() -> u32 {
    100
}

fn default_rate_limit_window() -> u64 {
    900 // 15 minutes
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_rate_limit_enabled(),
            max_requests: default_rate_limit_requests(),
            window_secs: default_rate_limit_window(),
            trust_forwarded_headers: false,
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Security configuration.
    #[serde(default)]
    pub security: SecurityConfig,
    /// Rate limit configuration.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(SchoolgateError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file, using defaults only when the file
    /// does not exist.
    ///
    /// A file that exists but cannot be read or parsed is an error, so a
    /// broken file never silently drops settings such as production mode.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        match Self::load(path) {
            Err(SchoolgateError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| SchoolgateError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `SCHOOLGATE_TOKEN_SECRET`: token secret
    /// - `AES_SECRET`: token secret, used when the above is unset
    /// - `PORT`: listen port
    /// - `SCHOOLGATE_PRODUCTION`: production mode (`true`/`false`, `1`/`0`, `yes`/`no`)
    ///
    /// Empty values are ignored.
    pub fn apply_env_overrides(&mut self) {
        let secret = ["SCHOOLGATE_TOKEN_SECRET", "AES_SECRET"]
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|value| !value.is_empty());
        if let Some(secret) = secret {
            self.security.token_secret = secret;
        }

        if let Ok(port) = std::env::var("PORT") {
            match port.parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) if port.is_empty() => {}
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid PORT"),
            }
        }

        if let Ok(production) = std::env::var("SCHOOLGATE_PRODUCTION") {
            match production.trim().to_ascii_lowercase().as_str() {
                "" => {}
                "1" | "true" | "yes" => self.server.production = true,
                "0" | "false" | "no" => self.server.production = false,
                _ => tracing::warn!(value = %production, "Ignoring invalid SCHOOLGATE_PRODUCTION"),
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.server.production && self.security.token_secret.is_empty() {
            return Err(SchoolgateError::Config(
                "production mode requires security.token_secret. \
                 Set it in config.toml or via SCHOOLGATE_TOKEN_SECRET."
                    .to_string(),
            ));
        }
        if self.security.max_failed_logins == 0 {
            return Err(SchoolgateError::Config(
                "security.max_failed_logins must be at least 1".to_string(),
            ));
        }
        if self.security.max_otp_attempts == 0 {
            return Err(SchoolgateError::Config(
                "security.max_otp_attempts must be at least 1".to_string(),
            ));
        }
        if self.security.otp_ttl_secs == 0 || self.security.otp_ttl_secs > MAX_OTP_TTL_SECS {
            return Err(SchoolgateError::Config(format!(
                "security.otp_ttl_secs must be between 1 and {MAX_OTP_TTL_SECS}"
            )));
        }
        if self.rate_limit.enabled
            && (self.rate_limit.max_requests == 0 || self.rate_limit.window_secs == 0)
        {
            return Err(SchoolgateError::Config(
                "rate_limit.max_requests and rate_limit.window_secs must be greater than 0"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Token secret to derive the key from.
    ///
    /// Falls back to [`FALLBACK_TOKEN_SECRET`] with a warning when none is
    /// configured; in production mode that is an error instead.
    pub fn token_secret(&self) -> Result<String> {
        if !self.security.token_secret.is_empty() {
            return Ok(self.security.token_secret.clone());
        }
        if self.server.production {
            return Err(SchoolgateError::Config(
                "token secret is not configured".to_string(),
            ));
        }
        tracing::warn!(
            "No token secret configured, using the built-in fallback. \
             Tokens issued now can be forged by anyone who knows it."
        );
        Ok(FALLBACK_TOKEN_SECRET.to_string())
    }
}
