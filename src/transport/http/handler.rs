//! HTTP request handlers
//!
//! - POST /estimate: run one estimation
//! - POST /diff: estimate two configurations and pair the results
//! - GET /health, /version, /pricing-snapshots: operational surface

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::engine::{DiffRequest, Engine, EstimateRequest};
use crate::engine::response::{DiffResponse, EstimateResponse};
use crate::pricing::store::SnapshotStore;
use crate::pricing::SnapshotInfo;

use super::error::Result;

/// Shared application state
pub struct AppState<S: SnapshotStore> {
    pub engine: Arc<Engine<S>>,
}

impl<S: SnapshotStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
        }
    }
}

/// POST /estimate
pub async fn handle_estimate<S: SnapshotStore>(
    State(state): State<AppState<S>>,
    Json(request): Json<EstimateRequest>,
) -> Result<Json<EstimateResponse>> {
    tracing::debug!(mode = request.mode.as_str(), "estimate request");

    // dropped on client disconnect; pricing checks it at every
    // suspension point
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let response = state.engine.estimate(&request, &cancel).await?;
    Ok(Json(response))
}

/// POST /diff
pub async fn handle_diff<S: SnapshotStore>(
    State(state): State<AppState<S>>,
    Json(request): Json<DiffRequest>,
) -> Result<Json<DiffResponse>> {
    tracing::debug!(mode = request.mode.as_str(), "diff request");

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let response = state.engine.diff(&request, &cancel).await?;
    Ok(Json(response))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub mappers: usize,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// GET /health
pub async fn handle_health<S: SnapshotStore>(
    State(state): State<AppState<S>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        mappers: state.engine.registry().len(),
        timestamp: chrono::Utc::now(),
    })
}

#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub name: &'static str,
    pub version: &'static str,
}

/// GET /version
pub async fn handle_version() -> Json<VersionResponse> {
    Json(VersionResponse {
        name: env!("CARGO_PKG_NAME"),
        version: crate::engine::engine_version(),
    })
}

/// GET /pricing-snapshots
pub async fn handle_snapshots<S: SnapshotStore>(
    State(state): State<AppState<S>>,
) -> Result<Json<Vec<SnapshotInfo>>> {
    let snapshots = state
        .engine
        .store()
        .list_snapshots()
        .await
        .map_err(crate::error::EngineError::from)?;
    Ok(Json(snapshots))
}
