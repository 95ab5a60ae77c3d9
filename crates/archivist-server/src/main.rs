use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use archivist_client::{WaybackClient, WaybackConfig};
use archivist_core::worker::{TracingWorkerReporter, WorkerService};
use archivist_core::{ArchiveConfig, WorkerConfig};
use archivist_db::{Database, DatabaseConfig};
use archivist_server::routes;
use archivist_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("archivist=info".parse()?))
        .with_target(false)
        .init();

    let api_key = std::env::var("ARCHIVIST_API_KEY")
        .map_err(|_| anyhow::anyhow!("ARCHIVIST_API_KEY must be set"))?;
    let port = std::env::var("ARCHIVIST_PORT").unwrap_or_else(|_| "3000".to_string());
    let run_worker = std::env::var("ARCHIVIST_WORKER")
        .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "no"))
        .unwrap_or(true);
    let addr = format!("0.0.0.0:{port}");

    let wayback = WaybackClient::new(&WaybackConfig::from_env()?)?;
    let archive_config = ArchiveConfig::from_env()?;

    let db = Database::connect(&DatabaseConfig::from_env()?).await?;
    db.migrate().await?;

    let state = Arc::new(AppState {
        db,
        wayback,
        archive_config,
        api_key,
    });

    let cancel_token = CancellationToken::new();
    let worker_handle = run_worker.then(|| {
        let worker = WorkerService::new(
            state.db.task_repo(),
            state.consumer(),
            WorkerConfig::default(),
        );
        let token = cancel_token.clone();
        tokio::spawn(async move {
            if let Err(e) = worker.run(token, &TracingWorkerReporter).await {
                tracing::error!(error = %e, "Archive worker stopped with error");
            }
        })
    });

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!(worker = run_worker, "Starting server on {addr}");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cancel_token.cancel();
    if let Some(handle) = worker_handle {
        let _ = handle.await;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
