//! HTTP server wiring and lifecycle.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::Result;
use crate::ratelimit::RateLimiter;

use super::handlers;
use super::middleware::{admission, AdmissionState};

/// HTTP server fronting application routes with the admission middleware.
pub struct HttpServer {
    addr: SocketAddr,
    state: AdmissionState,
}

impl HttpServer {
    /// Create a new server. Passing `None` for the limiter admits all
    /// traffic unthrottled (fail-open).
    pub fn new(addr: SocketAddr, limiter: Option<Arc<RateLimiter>>) -> Self {
        Self {
            addr,
            state: AdmissionState { limiter },
        }
    }

    /// Build the application router.
    ///
    /// The health route stays outside the admission middleware so probes
    /// never consume budget.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/test", get(handlers::test_route))
            .route_layer(from_fn_with_state(self.state.clone(), admission))
            .route("/health", get(handlers::health))
            .layer(TraceLayer::new_for_http())
    }

    /// Serve until `signal` resolves, then shut down gracefully.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, "Starting HTTP server");

        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await?;

        Ok(())
    }
}
