//! Node catalog handler.

use axum::extract::{Query, State};
use axum::Json;

use crate::api::state::AppState;
use crate::error::Result;
use crate::plugins::NodeView;

use super::{ApiResponse, TagQuery};

/// GET /api/nodes?tags=a,b&mode=or|and&exclude=c
pub async fn list_nodes(
    State(state): State<AppState>,
    Query(query): Query<TagQuery>,
) -> Result<Json<ApiResponse<Vec<NodeView>>>> {
    let filter = query.filter()?;
    Ok(ApiResponse::ok(state.registry.load().await?.list_nodes(&filter)))
}
