//! Admission middleware bridging HTTP requests to the rate limiter core.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::error::TurnstileError;
use crate::ratelimit::{RateLimitRequest, RateLimiter};

/// Request header carrying the client's API token.
pub const API_KEY_HEADER: &str = "API_KEY";

/// Fixed body returned with every "too many requests" response.
pub const RATE_LIMIT_EXCEEDED_MESSAGE: &str =
    "you have reached the maximum number of requests or actions allowed within a certain time frame";

/// Shared state for the admission middleware.
#[derive(Clone)]
pub struct AdmissionState {
    /// The limiter, or `None` to admit all traffic unthrottled.
    ///
    /// Fail-open is a deliberate availability choice: a service running
    /// without a configured limiter keeps serving rather than rejecting
    /// everything.
    pub limiter: Option<Arc<RateLimiter>>,
}

/// Decide whether the request may proceed.
///
/// Extracts the client identity, asks the limiter, and maps the outcome:
/// allowed passes through, a blocked identifier gets 429 with a fixed
/// message, and any limiter failure gets a generic 500.
pub async fn admission(
    State(state): State<AdmissionState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(limiter) = state.limiter.as_ref() else {
        return next.run(request).await;
    };

    let ip = extract_ip(&request).unwrap_or_default();
    let token = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .trim()
        .to_string();

    match limiter.allow(&RateLimitRequest { ip, token }).await {
        Ok(decision) if decision.allowed => next.run(request).await,
        Ok(_) | Err(TurnstileError::Blocked { .. }) => too_many_requests(),
        Err(err) => {
            error!(error = %err, "Rate limiter failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Best-effort client IP: first `X-Forwarded-For` entry, then
/// `X-Real-IP`, then the transport peer address.
fn extract_ip(request: &Request<Body>) -> Option<String> {
    let headers = request.headers();

    if let Some(forwarded) = header_value(headers, "x-forwarded-for") {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return Some(first.to_string());
            }
        }
    }

    if let Some(real_ip) = header_value(headers, "x-real-ip") {
        return Some(real_ip.to_string());
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn too_many_requests() -> Response {
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        RATE_LIMIT_EXCEEDED_MESSAGE,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with_headers(pairs: &[(&str, &str)]) -> Request<Body> {
        let mut builder = Request::builder().uri("/");
        for (name, value) in pairs {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_extract_ip_prefers_forwarded_for() {
        let request = request_with_headers(&[
            ("x-forwarded-for", "203.0.113.7, 10.0.0.1"),
            ("x-real-ip", "198.51.100.1"),
        ]);
        assert_eq!(extract_ip(&request).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn test_extract_ip_falls_back_to_real_ip() {
        let request = request_with_headers(&[("x-real-ip", "198.51.100.1")]);
        assert_eq!(extract_ip(&request).as_deref(), Some("198.51.100.1"));
    }

    #[test]
    fn test_extract_ip_uses_peer_address() {
        let mut request = request_with_headers(&[]);
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 9], 40000))));
        assert_eq!(extract_ip(&request).as_deref(), Some("10.0.0.9"));
    }

    #[test]
    fn test_extract_ip_none_without_sources() {
        let request = request_with_headers(&[]);
        assert_eq!(extract_ip(&request), None);
    }
}
