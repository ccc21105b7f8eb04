//! Poligap Cache server binary.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use poligap_cache::api::create_router;
use poligap_cache::cache::{DurableStore, FileDurableStore};
use poligap_cache::{AppState, BackgroundTasks, Config};

/// Main entry point for the cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the durable tier if `PERSIST_PATH` is set
/// 4. Start background cache cleanup and rate limit sweeps
/// 5. Serve the router until SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "poligap_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Poligap cache server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: max_entries={}, default_ttl={}s, port={}, cleanup_interval={}s, rate_limit_sweep_interval={}s",
        config.max_entries,
        config.default_ttl,
        config.server_port,
        config.cleanup_interval,
        config.rate_limit_sweep_interval
    );

    let state = AppState::from_config(&config, open_durable(&config));

    let tasks = BackgroundTasks::spawn(
        state.cache.clone(),
        config.cleanup_interval(),
        state.limiter.clone(),
        config.rate_limit_sweep_interval(),
    );
    info!("Background sweeps started");

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tasks.shutdown();
    info!("Server shutdown complete");
    Ok(())
}

/// The durable tier, if configured and readable. A broken store file only
/// costs durability, so startup continues without it.
fn open_durable(config: &Config) -> Option<Box<dyn DurableStore>> {
    let path = config.persist_path.as_ref()?;
    match FileDurableStore::open(path) {
        Ok(store) => {
            info!("Durable tier at {}", path.display());
            Some(Box::new(store.with_quota(config.persist_quota_bytes)))
        }
        Err(e) => {
            warn!("Durable tier unavailable at {}: {}", path.display(), e);
            None
        }
    }
}

/// Waits for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
