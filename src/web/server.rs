//! HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use crate::config::Config;
use crate::security::OtpNotifier;
use crate::{Database, Result, SchoolgateError};

use super::handlers::AppState;
use super::middleware::RateLimitState;
use super::router::{create_health_router, create_router};

/// HTTP server for the auth API.
pub struct WebServer {
    /// Server address.
    addr: SocketAddr,
    /// Application state.
    app_state: Arc<AppState>,
    /// Full configuration.
    config: Config,
}

impl WebServer {
    /// Create a new server.
    ///
    /// `token_secret` is the resolved secret from [`Config::token_secret`].
    pub fn new(config: &Config, db: Database, token_secret: &str) -> Result<Self> {
        let addr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .map_err(|e| SchoolgateError::Config(format!("invalid server address: {e}")))?;

        let app_state = AppState::new(db, token_secret, config.security.policy());

        Ok(Self {
            addr,
            app_state: Arc::new(app_state),
            config: config.clone(),
        })
    }

    /// Replace the OTP notifier.
    pub fn with_notifier(mut self, notifier: Arc<dyn OtpNotifier>) -> Self {
        let state = Arc::unwrap_or_clone(self.app_state).with_notifier(notifier);
        self.app_state = Arc::new(state);
        self
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn build_router(&self) -> Router {
        let rate_limit = self.config.rate_limit.enabled.then(|| {
            let limiter = Arc::new(RateLimitState::from_config(&self.config.rate_limit));
            limiter.clone().start_cleanup_task();
            tracing::info!(
                max_requests = self.config.rate_limit.max_requests,
                window_secs = self.config.rate_limit.window_secs,
                "Auth rate limiting enabled"
            );
            limiter
        });

        create_router(self.app_state.clone(), rate_limit, &self.config.server)
            .merge(create_health_router())
    }

    async fn bind(&self) -> std::io::Result<(TcpListener, Router)> {
        let router = self.build_router();
        let listener = TcpListener::bind(self.addr).await?;
        tracing::info!("Web server listening on http://{}", listener.local_addr()?);
        Ok((listener, router))
    }

    /// Run the server until it fails.
    pub async fn run(self) -> std::io::Result<()> {
        let (listener, router) = self.bind().await?;
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
    }

    /// Run the server in the background and return the bound address.
    ///
    /// Useful for tests binding to port 0.
    pub async fn run_with_addr(self) -> std::io::Result<SocketAddr> {
        let (listener, router) = self.bind().await?;
        let local_addr = listener.local_addr()?;

        tokio::spawn(async move {
            if let Err(e) = axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            {
                tracing::error!("Web server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}
