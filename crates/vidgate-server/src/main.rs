//! Vidgate Server - Main entry point

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;
use vidgate_common::logging::{init_logging, LogConfig};
use vidgate_server::{config::ServerConfig, routes, AppState};
use vidgate_ingest::{IngestionOrchestrator, PipelineConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging with configuration from environment
    let log_config = LogConfig::builder()
        .log_file_prefix("vidgate-server".to_string())
        .filter_directives("vidgate_server=debug,vidgate_ingest=debug,tower_http=debug".to_string())
        .build();
    let log_config = LogConfig::from_env().unwrap_or(log_config);
    init_logging(&log_config)?;

    info!("Starting Vidgate Server");

    // Load configuration
    let server_config = ServerConfig::load()?;
    let pipeline_config = PipelineConfig::from_env()?;
    info!(
        "Configuration loaded - server will bind to {}:{}, scratch dir {}",
        server_config.host,
        server_config.port,
        pipeline_config.scratch_dir.display()
    );

    // Build the pipeline
    let orchestrator = Arc::new(IngestionOrchestrator::new(pipeline_config)?);

    // Start the disk monitor loop; crossing critical triggers cleanup
    let monitor_guard = Arc::clone(orchestrator.disk());
    let _monitor = tokio::spawn(async move {
        monitor_guard.monitor_loop().await;
    });
    info!("Disk monitor started");

    // Build the application router
    let state = AppState { orchestrator };
    let app = routes::router(state).layer(TraceLayer::new_for_http());

    // Create socket address
    let addr: SocketAddr = format!("{}:{}", server_config.host, server_config.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Start server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(server_config.shutdown_grace()))
        .await?;

    info!("Server shut down gracefully");

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal(grace: Duration) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }

    // Give in-flight ingestion requests a moment to finish
    info!("Waiting {} seconds for connections to close", grace.as_secs());
    tokio::time::sleep(grace).await;
}
