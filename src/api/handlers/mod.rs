//! HTTP handlers, grouped by resource.

pub mod health;
pub mod nodes;
pub mod plugins;
pub mod sources;

use axum::body::Bytes;
use axum::Json;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{NodeworksError, Result};
use crate::plugins::TagFilter;

/// Success envelope for list and lookup responses.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

/// `?tags=a,b&mode=or|and&exclude=c`
#[derive(Debug, Default, Deserialize)]
pub struct TagQuery {
    pub tags: Option<String>,
    pub mode: Option<String>,
    pub exclude: Option<String>,
}

impl TagQuery {
    pub fn filter(&self) -> Result<TagFilter> {
        TagFilter::parse(
            self.tags.as_deref(),
            self.mode.as_deref(),
            self.exclude.as_deref(),
        )
    }
}

/// Parse an optional JSON body; an empty body yields the default.
pub(crate) fn parse_json_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| NodeworksError::InvalidRequest(format!("Invalid JSON body: {}", e)))
}
