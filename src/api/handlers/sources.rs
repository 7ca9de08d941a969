//! Event-source catalog and lifecycle handlers.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::api::state::AppState;
use crate::error::Result;
use crate::plugins::{EventSourceView, EventTypeView};
use crate::sources::{SourceStatus, StopOutcome};

use super::{parse_json_body, ApiResponse, TagQuery};

/// GET /api/event-sources
pub async fn list_sources(
    State(state): State<AppState>,
    Query(query): Query<TagQuery>,
) -> Result<Json<ApiResponse<Vec<EventSourceView>>>> {
    let filter = query.filter()?;
    let statuses = state.sources.snapshot().await;
    let catalog = state.registry.load().await?;
    Ok(ApiResponse::ok(catalog.list_event_sources(&filter, &statuses)))
}

/// GET /api/event-sources/active
pub async fn active_sources(State(state): State<AppState>) -> Json<ApiResponse<Vec<SourceStatus>>> {
    ApiResponse::ok(state.sources.active().await)
}

/// GET /api/event-sources/{id}
pub async fn get_source(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<EventSourceView>>> {
    let catalog = state.registry.load().await?;
    catalog.event_source(&id)?;
    let status = state.sources.status(&id).await;
    Ok(ApiResponse::ok(catalog.event_source_view(&id, Some(status))?))
}

/// GET /api/event-sources/{id}/event-types
pub async fn source_event_types(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<EventTypeView>>>> {
    Ok(ApiResponse::ok(state.registry.load().await?.event_types(&id)?))
}

/// GET /api/event-types
pub async fn all_event_types(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<EventTypeView>>>> {
    Ok(ApiResponse::ok(state.registry.load().await?.all_event_types()))
}

#[derive(Debug, Default, Deserialize)]
struct StartBody {
    #[serde(default)]
    config: Value,
}

/// POST /api/event-sources/{id}/start
pub async fn start_source(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<ApiResponse<SourceStatus>>> {
    let body: StartBody = parse_json_body(&body)?;
    let status = state.sources.start(&id, body.config).await?;
    Ok(ApiResponse::ok(status))
}

/// POST /api/event-sources/{id}/stop
pub async fn stop_source(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<StopOutcome>>> {
    Ok(ApiResponse::ok(state.sources.stop(&id).await?))
}

/// GET /api/event-sources/{id}/status
pub async fn source_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<SourceStatus>>> {
    state.registry.load().await?.event_source(&id)?;
    Ok(ApiResponse::ok(state.sources.status(&id).await))
}
