use crate::config::Config;
use crate::streaming::{self, ChunkStore};
use crate::transcoder::TranscoderSupervisor;
use anyhow::{Context, Result};
use axum::{
    http::{header, Method},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod routes_admin;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    /// Chunk cache shared by uploads and downloads
    pub store: ChunkStore,
    /// The single transcoder process
    pub transcoder: Arc<TranscoderSupervisor>,
    /// Cancelled when the server starts shutting down
    pub shutdown: CancellationToken,
}

impl AppContext {
    pub fn new(config: Config) -> Self {
        let store = ChunkStore::new(config.cache.eviction_delay());
        let transcoder = Arc::new(TranscoderSupervisor::new(config.transcoder.clone()));
        Self {
            config: Arc::new(config),
            store,
            transcoder,
            shutdown: CancellationToken::new(),
        }
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .merge(routes_admin::admin_routes())
        .merge(streaming::relay_router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Start the HTTP server
pub async fn start_server(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let autostart = config.transcoder.autostart;
    let ctx = AppContext::new(config);
    let app = create_router(ctx.clone());

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    if autostart {
        let outcome = ctx.transcoder.start();
        tracing::info!("Transcoder autostart: {}", outcome.message());
    }

    // Held playlist uploads end when the token is cancelled, letting
    // graceful shutdown complete.
    let shutdown = ctx.shutdown.clone();
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown.cancel();
        })
        .await;

    ctx.transcoder.shutdown().await;
    result?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
