//! Plugin and node execution handlers.

use std::path::{Path as FsPath, PathBuf};

use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::http::header;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::api::state::AppState;
use crate::error::{NodeworksError, Result};
use crate::plugins::{NodeView, PluginSummary};
use crate::worker::ExecutionResult;

use super::{parse_json_body, ApiResponse};

/// GET /api/plugins
pub async fn list_plugins(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<PluginSummary>>>> {
    let catalog = state.registry.load().await?;
    Ok(ApiResponse::ok(
        catalog.plugins().iter().map(|p| p.summary()).collect(),
    ))
}

/// GET /api/plugins/{id}
pub async fn get_plugin(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<PluginSummary>>> {
    let catalog = state.registry.load().await?;
    Ok(ApiResponse::ok(catalog.plugin(&id)?.summary()))
}

/// GET /api/plugins/{id}/nodes
pub async fn plugin_nodes(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<NodeView>>>> {
    let catalog = state.registry.load().await?;
    Ok(ApiResponse::ok(catalog.nodes_for_plugin(&id)?))
}

#[derive(Debug, Default, Deserialize)]
struct ExecuteBody {
    #[serde(default)]
    inputs: Value,
    #[serde(default)]
    config: Value,
}

/// POST /api/plugins/{id}/nodes/{node}/execute
///
/// Accepts `{inputs, config}` as JSON, or a multipart form whose `inputs` and
/// `config` text fields hold JSON objects. Other text fields become string
/// inputs; file parts are stored under the upload directory and passed as
/// `{filename, content_type, size, path}`. Stored files are removed once the
/// execution has finished, whatever its outcome.
pub async fn execute_node(
    State(state): State<AppState>,
    Path((plugin_id, node_id)): Path<(String, String)>,
    request: Request,
) -> Result<Json<ExecutionResult>> {
    let mut uploads = Vec::new();
    let result = match read_execute_request(&state, request, &mut uploads).await {
        Ok((inputs, config)) => {
            state
                .dispatcher
                .execute(&plugin_id, &node_id, Value::Object(inputs), Value::Object(config))
                .await
        }
        Err(e) => Err(e),
    };
    remove_uploads(&uploads).await;
    Ok(Json(result?))
}

async fn read_execute_request(
    state: &AppState,
    request: Request,
    uploads: &mut Vec<PathBuf>,
) -> Result<(Map<String, Value>, Map<String, Value>)> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    if is_multipart {
        let multipart = Multipart::from_request(request, state)
            .await
            .map_err(|e| NodeworksError::InvalidRequest(e.body_text()))?;
        return read_multipart(multipart, &state.config.server.upload_dir, uploads).await;
    }

    let body = Bytes::from_request(request, state)
        .await
        .map_err(|e| NodeworksError::InvalidRequest(e.body_text()))?;
    let body: ExecuteBody = parse_json_body(&body)?;
    Ok((
        expect_object("inputs", body.inputs)?,
        expect_object("config", body.config)?,
    ))
}

async fn remove_uploads(uploads: &[PathBuf]) {
    for path in uploads {
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!(path = %path.display(), error = %e, "Failed to remove upload");
        }
    }
}

fn expect_object(field: &str, value: Value) -> Result<Map<String, Value>> {
    match value {
        Value::Null => Ok(Map::new()),
        Value::Object(map) => Ok(map),
        other => Err(NodeworksError::InvalidRequest(format!(
            "'{}' must be a JSON object, got {}",
            field, other
        ))),
    }
}

fn parse_object_field(field: &str, text: &str) -> Result<Map<String, Value>> {
    let value: Value = serde_json::from_str(text).map_err(|e| {
        NodeworksError::InvalidRequest(format!("'{}' field is not valid JSON: {}", field, e))
    })?;
    expect_object(field, value)
}

async fn read_multipart(
    mut multipart: Multipart,
    upload_dir: &FsPath,
    uploads: &mut Vec<PathBuf>,
) -> Result<(Map<String, Value>, Map<String, Value>)> {
    let mut inputs = Map::new();
    let mut config = Map::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| NodeworksError::InvalidRequest(format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name.is_empty() {
            continue;
        }

        if let Some(file_name) = field.file_name().map(String::from) {
            let content_type = field.content_type().map(String::from);
            let data = field
                .bytes()
                .await
                .map_err(|e| NodeworksError::InvalidRequest(format!("Read error: {}", e)))?;

            tokio::fs::create_dir_all(upload_dir).await?;
            let stored = upload_dir.join(stored_name(&file_name));
            uploads.push(stored.clone());
            tokio::fs::write(&stored, &data).await?;
            debug!(field = %name, path = %stored.display(), size = data.len(), "Stored upload");

            inputs.insert(
                name,
                json!({
                    "filename": file_name,
                    "content_type": content_type,
                    "size": data.len(),
                    "path": stored.to_string_lossy(),
                }),
            );
            continue;
        }

        let text = field
            .text()
            .await
            .map_err(|e| NodeworksError::InvalidRequest(format!("Read error: {}", e)))?;
        match name.as_str() {
            "inputs" => inputs.extend(parse_object_field("inputs", &text)?),
            "config" => config.extend(parse_object_field("config", &text)?),
            _ => {
                inputs.insert(name, Value::String(text));
            }
        }
    }

    Ok((inputs, config))
}

/// Random file name keeping a short alphanumeric extension from the client name.
fn stored_name(client_name: &str) -> String {
    let extension = FsPath::new(client_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| e.len() <= 16 && e.chars().all(|c| c.is_ascii_alphanumeric()));
    match extension {
        Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
        None => Uuid::new_v4().to_string(),
    }
}
