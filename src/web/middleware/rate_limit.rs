//! Per-IP rate limiting for the authentication endpoints.

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::{
    collections::HashMap,
    net::SocketAddr,
    num::NonZeroU32,
    sync::{Arc, RwLock},
    time::{Duration, Instant},
};

use crate::config::RateLimitConfig;
use crate::web::error::ApiError;

/// Rate limiter for one client IP.
pub type IpRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

struct Entry {
    limiter: Arc<IpRateLimiter>,
    last_seen: Instant,
}

/// State for rate limiting.
///
/// Each IP gets `max_requests` requests up front, replenished evenly over
/// the window. Clients are keyed by their socket address unless proxy
/// headers are trusted.
#[derive(Clone)]
pub struct RateLimitState {
    limiters: Arc<RwLock<HashMap<String, Entry>>>,
    quota: Quota,
    window: Duration,
    trust_forwarded_headers: bool,
}

impl RateLimitState {
    /// Create a new rate limit state allowing `max_requests` per `window`.
    pub fn new(max_requests: u32, window: Duration) -> Self {
        let burst = NonZeroU32::new(max_requests).unwrap_or(NonZeroU32::MIN);
        let period = window / burst.get();
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst);

        Self {
            limiters: Arc::new(RwLock::new(HashMap::new())),
            quota,
            window,
            trust_forwarded_headers: false,
        }
    }

    /// Key clients by `X-Forwarded-For` / `X-Real-IP` instead of the socket
    /// address. Only safe behind a proxy that overwrites those headers.
    pub fn trust_forwarded_headers(mut self, trust: bool) -> Self {
        self.trust_forwarded_headers = trust;
        self
    }

    /// Create from configuration.
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, Duration::from_secs(config.window_secs))
            .trust_forwarded_headers(config.trust_forwarded_headers)
    }

    /// Get or create the limiter for the given IP.
    fn limiter_for(&self, ip: &str) -> Arc<IpRateLimiter> {
        let mut guard = self.limiters.write().unwrap_or_else(|e| e.into_inner());
        let entry = guard.entry(ip.to_string()).or_insert_with(|| Entry {
            limiter: Arc::new(RateLimiter::direct(self.quota)),
            last_seen: Instant::now(),
        });
        entry.last_seen = Instant::now();
        entry.limiter.clone()
    }

    /// Check if a request from `ip` is allowed.
    pub fn check(&self, ip: &str) -> bool {
        self.limiter_for(ip).check().is_ok()
    }

    /// Number of tracked IPs.
    pub fn tracked(&self) -> usize {
        self.limiters.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Drop limiters idle for longer than a full window; their bucket is
    /// refilled by then, so forgetting them changes nothing.
    pub fn cleanup(&self) {
        let window = self.window;
        let mut guard = self.limiters.write().unwrap_or_else(|e| e.into_inner());
        guard.retain(|_, entry| entry.last_seen.elapsed() < window);
    }

    /// Start a background task to periodically clean up idle entries.
    pub fn start_cleanup_task(self: Arc<Self>) {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(300)).await;
                self.cleanup();
            }
        });
    }
}

/// Extract client IP from request.
///
/// Proxy headers are client-controlled, so they are only read when
/// `trust_forwarded_headers` is set.
fn get_client_ip(req: &Request, trust_forwarded_headers: bool) -> String {
    if trust_forwarded_headers {
        if let Some(forwarded) = req
            .headers()
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
        {
            if let Some(ip) = forwarded.split(',').next() {
                return ip.trim().to_string();
            }
        }

        if let Some(real_ip) = req
            .headers()
            .get("X-Real-IP")
            .and_then(|v| v.to_str().ok())
        {
            return real_ip.to_string();
        }
    }

    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    "unknown".to_string()
}

/// Rate limiting middleware for the authentication endpoints.
pub async fn auth_rate_limit(
    State(state): State<Arc<RateLimitState>>,
    req: Request,
    next: Next,
) -> Response {
    let ip = get_client_ip(&req, state.trust_forwarded_headers);

    if !state.check(&ip) {
        tracing::warn!(ip = %ip, path = %req.uri().path(), "Auth rate limit exceeded");
        return ApiError::too_many_requests("Too many requests. Please try again later.")
            .into_response();
    }

    next.run(req).await
}
