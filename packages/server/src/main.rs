//! job-server: HTTP front end for the speech synthesis job queue.
//!
//! Startup order:
//! 1. Tracing (`RUST_LOG`, default `info`).
//! 2. Queue and artifact storage configuration from the environment.
//! 3. Job queue with the demo synthesis processor.
//! 4. Axum router with request tracing, served until Ctrl-C or SIGTERM.
//! 5. Queue shutdown: pending jobs are cancelled and workers drained.

mod synth;

use std::net::SocketAddr;
use std::sync::Arc;

use actors::{JobQueue, QueueConfig};
use storage::Storage;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::synth::SynthProcessor;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8004";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "job-server starting");

    let config = QueueConfig::from_env()?;
    let storage = Storage::from_env().await?;

    let queue = JobQueue::builder(SynthProcessor::default())
        .with_config(config)
        .with_storage(storage)
        .with_validator(synth::validate)
        .start()
        .await?;
    let queue = Arc::new(queue);

    let app = api::router(queue.clone()).layer(TraceLayer::new_for_http());

    let bind = std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    let addr: SocketAddr = bind.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    queue.shutdown().await;
    info!("job-server stopped");
    Ok(())
}

/// Resolves on SIGINT (Ctrl-C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received, draining job queue");
}
