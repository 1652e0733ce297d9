//! End-to-end tests of the admission middleware over the HTTP router.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use turnstile::http::middleware::RATE_LIMIT_EXCEEDED_MESSAGE;
use turnstile::http::HttpServer;
use turnstile::ratelimit::{LimiterConfig, RateLimitRule, RateLimiter};
use turnstile::storage::MemoryCounterStore;

fn bind_addr() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

fn rule(requests: u32) -> RateLimitRule {
    RateLimitRule::new(requests, Duration::from_secs(60), Duration::from_secs(60))
}

fn limiter(config: LimiterConfig) -> Arc<RateLimiter> {
    let store = Arc::new(MemoryCounterStore::new());
    Arc::new(RateLimiter::new(store, config).unwrap())
}

fn test_request(ip: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri("/test").header("x-forwarded-for", ip);
    if let Some(token) = token {
        builder = builder.header("API_KEY", token);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_requests_pass_until_budget_exhausted() {
    let server = HttpServer::new(
        bind_addr(),
        Some(limiter(LimiterConfig {
            default_ip_rule: rule(3),
            ..Default::default()
        })),
    );
    let app = server.router();

    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(test_request("192.168.1.1", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(test_request("192.168.1.1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], RATE_LIMIT_EXCEEDED_MESSAGE.as_bytes());
}

#[tokio::test]
async fn test_other_clients_keep_their_own_budget() {
    let server = HttpServer::new(
        bind_addr(),
        Some(limiter(LimiterConfig {
            default_ip_rule: rule(1),
            ..Default::default()
        })),
    );
    let app = server.router();

    let first = app
        .clone()
        .oneshot(test_request("10.0.0.1", None))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .clone()
        .oneshot(test_request("10.0.0.1", None))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);

    let other = app
        .clone()
        .oneshot(test_request("10.0.0.2", None))
        .await
        .unwrap();
    assert_eq!(other.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_token_override_beats_ip_budget() {
    let server = HttpServer::new(
        bind_addr(),
        Some(limiter(LimiterConfig {
            default_ip_rule: rule(1),
            token_rules: HashMap::from([("abc123".to_string(), rule(5))]),
            ..Default::default()
        })),
    );
    let app = server.router();

    for _ in 0..5 {
        let response = app
            .clone()
            .oneshot(test_request("192.168.1.1", Some("abc123")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(test_request("192.168.1.1", Some("abc123")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_unrecognized_token_consumes_ip_budget() {
    let server = HttpServer::new(
        bind_addr(),
        Some(limiter(LimiterConfig {
            default_ip_rule: rule(1),
            ..Default::default()
        })),
    );
    let app = server.router();

    let first = app
        .clone()
        .oneshot(test_request("10.0.0.3", Some("unlisted")))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .clone()
        .oneshot(test_request("10.0.0.3", Some("unlisted")))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_peer_address_used_when_no_headers() {
    let server = HttpServer::new(
        bind_addr(),
        Some(limiter(LimiterConfig {
            default_ip_rule: rule(1),
            ..Default::default()
        })),
    );
    let app = server.router();

    let peer = SocketAddr::from(([10, 0, 0, 9], 40000));
    let request = || {
        let mut request = Request::builder()
            .uri("/test")
            .body(Body::empty())
            .unwrap();
        request.extensions_mut().insert(ConnectInfo(peer));
        request
    };

    let first = app.clone().oneshot(request()).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app.clone().oneshot(request()).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_missing_identity_is_server_error() {
    let server = HttpServer::new(
        bind_addr(),
        Some(limiter(LimiterConfig {
            default_ip_rule: rule(1),
            ..Default::default()
        })),
    );
    let app = server.router();

    let request = Request::builder()
        .uri("/test")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_fail_open_without_limiter() {
    let server = HttpServer::new(bind_addr(), None);
    let app = server.router();

    for _ in 0..10 {
        let response = app
            .clone()
            .oneshot(test_request("192.168.1.1", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_health_is_not_limited() {
    let server = HttpServer::new(
        bind_addr(),
        Some(limiter(LimiterConfig {
            default_ip_rule: rule(1),
            ..Default::default()
        })),
    );
    let app = server.router();

    // Exhaust the budget on the limited route.
    app.clone()
        .oneshot(test_request("192.168.1.1", None))
        .await
        .unwrap();

    for _ in 0..3 {
        let request = Request::builder()
            .uri("/health")
            .header("x-forwarded-for", "192.168.1.1")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_demo_route_payload() {
    let server = HttpServer::new(bind_addr(), None);
    let app = server.router();

    let response = app
        .oneshot(test_request("192.168.1.1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let payload: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(payload["message"], "Request successful");
}
