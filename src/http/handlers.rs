//! HTTP handlers.

use axum::Json;
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Liveness probe, served outside the admission middleware.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Response body of the demo route behind the limiter.
#[derive(Debug, Serialize)]
pub struct TestResponse {
    pub message: &'static str,
}

/// Demo endpoint for exercising the limiter.
pub async fn test_route() -> Json<TestResponse> {
    Json(TestResponse {
        message: "Request successful",
    })
}
