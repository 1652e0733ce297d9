use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use turnstile::config::{StorageBackend, TurnstileConfig};
use turnstile::http::HttpServer;
use turnstile::ratelimit::{CounterStore, RateLimiter};
use turnstile::storage::{MemoryCounterStore, RedisCounterStore};

/// Admission-control rate limiting service.
#[derive(Debug, Parser)]
#[command(name = "turnstile", version, about)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    info!("Starting Turnstile Admission Control Service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = TurnstileConfig::load(cli.config.as_deref())?;
    info!(
        bind_addr = %config.server.bind_addr,
        backend = ?config.storage.backend,
        "Configuration loaded"
    );

    let store: Arc<dyn CounterStore> = match config.storage.backend {
        StorageBackend::Redis => {
            Arc::new(RedisCounterStore::connect(&config.storage.redis.url).await?)
        }
        StorageBackend::Memory => {
            let store = Arc::new(MemoryCounterStore::new());
            spawn_purge_task(store.clone());
            store
        }
    };

    let limiter = Arc::new(RateLimiter::new(store, config.limiter_config())?);
    info!("Rate limiter initialized");

    let server = HttpServer::new(config.server.bind_addr, Some(limiter));

    // Run the server with graceful shutdown on Ctrl+C or SIGTERM
    server.serve_with_shutdown(shutdown_signal()).await?;

    info!("Turnstile Admission Control Service stopped");
    Ok(())
}

/// Periodically drop expired in-memory counters and block markers.
fn spawn_purge_task(store: Arc<MemoryCounterStore>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            store.purge_expired();
        }
    });
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
