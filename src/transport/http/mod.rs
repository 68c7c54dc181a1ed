//! HTTP transport using Axum
//!
//! JSON in, JSON out. CORS is open for development use; the engine
//! itself carries no authentication surface. Shutdown is graceful on
//! ctrl-c.

pub mod error;
pub mod handler;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::HttpConfig;
use crate::engine::Engine;
use crate::pricing::store::SnapshotStore;

use handler::AppState;

/// Start the HTTP server and block until shutdown.
///
/// # Endpoints
/// - POST /estimate: estimate one configuration
/// - POST /diff: diff two configurations
/// - GET /health: liveness and mapper count
/// - GET /version: engine version
/// - GET /pricing-snapshots: snapshots known to the store
pub async fn start_http_server<S: SnapshotStore + 'static>(
    config: HttpConfig,
    engine: Arc<Engine<S>>,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Initializing HTTP server...");

    let state = AppState { engine };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = Router::new()
        .route("/estimate", post(handler::handle_estimate::<S>))
        .route("/diff", post(handler::handle_diff::<S>))
        .route("/health", get(handler::handle_health::<S>))
        .route("/version", get(handler::handle_version))
        .route("/pricing-snapshots", get(handler::handle_snapshots::<S>))
        .layer(cors)
        .with_state(state);

    if let Some(ui_dir) = &config.ui_dir {
        tracing::info!(dir = %ui_dir.display(), "serving UI files");
        app = app.fallback_service(tower_http::services::ServeDir::new(ui_dir));
    }

    tracing::info!("HTTP server listening on {}", config.addr);
    tracing::info!(
        "Endpoints: POST /estimate, POST /diff, GET /health, GET /version, GET /pricing-snapshots"
    );

    let listener = tokio::net::TcpListener::bind(config.addr).await?;

    // graceful shutdown on ctrl-c
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received shutdown signal (Ctrl+C)");
                let _ = shutdown_tx.send(());
            }
            Err(err) => {
                tracing::error!("Failed to listen for shutdown signal: {}", err);
            }
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            tracing::info!("Shutting down HTTP server...");
        })
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
