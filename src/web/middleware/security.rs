//! Security response headers.

use axum::{
    extract::Request,
    http::header::{HeaderName, HeaderValue, CACHE_CONTROL},
    middleware::Next,
    response::Response,
};

const HEADERS: [(&str, &str); 4] = [
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("referrer-policy", "no-referrer"),
    ("x-xss-protection", "0"),
];

/// Add security headers to every response.
///
/// Responses carrying tokens must not be cached, so `Cache-Control:
/// no-store` is set unless a handler chose its own policy.
/// HSTS belongs at the TLS-terminating proxy.
pub async fn security_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    for (name, value) in HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }

    if !headers.contains_key(CACHE_CONTROL) {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    }

    response
}
