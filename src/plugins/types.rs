//! Plugin types for Nodeworks
//!
//! This module defines the manifest structures parsed from each plugin's
//! `manifest.json`, the loaded plugin representation, and the enriched views
//! handed out to API callers.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::RuntimeConfig;

/// File name of the manifest inside every plugin folder.
pub const MANIFEST_FILE: &str = "manifest.json";

/// What a plugin folder provides.
///
/// Anything other than `event-source` is treated as a node plugin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PluginKind {
    #[serde(alias = "event_source", alias = "eventSource")]
    EventSource,
    #[default]
    #[serde(other)]
    NodePlugin,
}

impl std::fmt::Display for PluginKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PluginKind::EventSource => write!(f, "event-source"),
            PluginKind::NodePlugin => write!(f, "node-plugin"),
        }
    }
}

/// The manifest loaded from a plugin's `manifest.json` file.
///
/// # Example
///
/// ```json
/// {
///   "name": "Text Tools",
///   "version": "1.0.0",
///   "description": "String helpers",
///   "type": "node-plugin",
///   "tags": ["text"],
///   "nodes": [
///     {
///       "id": "upper",
///       "name": "Uppercase",
///       "category": "transform",
///       "inputs": [{ "name": "text", "type": "string" }],
///       "outputs": [{ "name": "text", "type": "string" }]
///     }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginManifest {
    /// Optional explicit id. The folder name is used when absent.
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub author: Option<String>,

    #[serde(default, rename = "type")]
    pub kind: PluginKind,

    /// Nodes provided by a node plugin.
    #[serde(default)]
    pub nodes: Vec<NodeDef>,

    /// Event types produced by an event source.
    #[serde(default, alias = "event_types")]
    pub event_types: Vec<EventTypeDef>,

    /// Plugin-level configuration schema (event sources use this one).
    #[serde(default, alias = "config_schema")]
    pub config_schema: Option<Value>,

    /// Event-source entry file, relative to the plugin folder.
    #[serde(default)]
    pub entry: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_version() -> String {
    "0.0.0".to_string()
}

/// A node declared inside a node plugin manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDef {
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub category: Option<String>,

    /// Input port declarations, passed through untouched.
    #[serde(default)]
    pub inputs: Vec<Value>,

    /// Output port declarations, passed through untouched.
    #[serde(default)]
    pub outputs: Vec<Value>,

    #[serde(default, alias = "config_schema")]
    pub config_schema: Option<Value>,

    #[serde(default)]
    pub tags: Vec<String>,
}

impl NodeDef {
    /// Display name, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.id)
    }

    /// Category, defaulting to `general`.
    pub fn category(&self) -> &str {
        self.category
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or("general")
    }
}

/// An event type declared by an event source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventTypeDef {
    #[serde(rename = "type")]
    pub event_type: String,

    #[serde(default)]
    pub label: Option<String>,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub schema: Option<Value>,
}

/// A loaded plugin: its resolved id, manifest, and folder.
#[derive(Debug, Clone)]
pub struct Plugin {
    pub id: String,
    pub manifest: PluginManifest,
    pub path: PathBuf,
}

impl Plugin {
    /// Create a plugin, resolving its id from the manifest or folder name.
    pub fn new(folder_name: &str, manifest: PluginManifest, path: PathBuf) -> Self {
        let id = manifest
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(folder_name)
            .to_string();
        Self { id, manifest, path }
    }

    /// Display name, falling back to the id.
    pub fn name(&self) -> &str {
        self.manifest
            .name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.id)
    }

    pub fn kind(&self) -> PluginKind {
        self.manifest.kind
    }

    pub fn is_event_source(&self) -> bool {
        self.manifest.kind == PluginKind::EventSource
    }

    /// Find a node by declared id, or by the slug of its name.
    pub fn find_node(&self, node_id: &str) -> Option<&NodeDef> {
        self.manifest
            .nodes
            .iter()
            .find(|n| n.id == node_id)
            .or_else(|| {
                self.manifest
                    .nodes
                    .iter()
                    .find(|n| super::schema::slugify(n.display_name()) == node_id)
            })
    }

    /// Fixed-convention entrypoint of a node plugin.
    pub fn node_entrypoint(&self, runtime: &RuntimeConfig) -> PathBuf {
        self.path.join(&runtime.node_entrypoint)
    }

    /// Entry file of an event source, from the manifest or the configured default.
    pub fn source_entrypoint(&self, runtime: &RuntimeConfig) -> PathBuf {
        let entry = self
            .manifest
            .entry
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .unwrap_or(&runtime.event_source_entrypoint);
        self.path.join(entry)
    }

    pub fn summary(&self) -> PluginSummary {
        PluginSummary {
            id: self.id.clone(),
            name: self.name().to_string(),
            description: self.manifest.description.clone(),
            version: self.manifest.version.clone(),
            author: self.manifest.author.clone(),
            kind: self.kind(),
            node_count: self.manifest.nodes.len(),
            event_type_count: self.manifest.event_types.len(),
            tags: self.manifest.tags.clone(),
        }
    }
}

/// Plugin listing entry returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct PluginSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub author: Option<String>,
    #[serde(rename = "type")]
    pub kind: PluginKind,
    pub node_count: usize,
    pub event_type_count: usize,
    pub tags: Vec<String>,
}

/// An enriched node descriptor exposed to callers.
///
/// `config_schema` is never empty; see [`super::schema::normalize_config_schema`].
#[derive(Debug, Clone, Serialize)]
pub struct NodeView {
    pub id: String,
    /// Slug derived from the node name.
    pub node_id: String,
    pub plugin_id: String,
    pub plugin_name: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub inputs: Vec<Value>,
    pub outputs: Vec<Value>,
    #[serde(rename = "configSchema")]
    pub config_schema: Value,
    pub tags: Vec<String>,
}

/// An event source as listed by the API, with its lifecycle status.
#[derive(Debug, Clone, Serialize)]
pub struct EventSourceView {
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    #[serde(rename = "eventTypes")]
    pub event_types: Vec<EventTypeDef>,
    #[serde(rename = "configSchema")]
    pub config_schema: Option<Value>,
    pub tags: Vec<String>,
    pub status: crate::sources::SourceStatus,
}

/// One row of the aggregate event-type listing.
#[derive(Debug, Clone, Serialize)]
pub struct EventTypeView {
    pub source_id: String,
    pub source_name: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub label: String,
    pub description: String,
    pub schema: Option<Value>,
}
