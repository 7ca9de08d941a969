//! Health check handler.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::state::AppState;
use crate::error::Result;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub plugin_count: usize,
    pub plugin_ids: Vec<String>,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    let catalog = state.registry.load().await?;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        plugin_count: catalog.len(),
        plugin_ids: catalog.plugins().iter().map(|p| p.id.clone()).collect(),
    }))
}
