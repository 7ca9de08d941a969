//! Plugin discovery and loading for Nodeworks
//!
//! This module handles discovering plugin folders, loading and parsing
//! `manifest.json` files, and validating manifest contents for safety
//! and correctness.

use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::{NodeworksError, Result};

use super::types::{Plugin, PluginKind, PluginManifest, MANIFEST_FILE};

static PLUGIN_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.\-]{0,127}$").expect("valid regex"));

/// Discover plugins under a root folder.
///
/// Every subfolder holding a `manifest.json` is loaded and validated, in
/// folder-name order. A folder whose manifest is broken is logged and skipped;
/// it never prevents the rest from being discovered. A missing root yields
/// an empty list.
pub fn discover_plugins(root: &Path) -> Vec<Plugin> {
    let mut plugins = Vec::new();

    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() == std::io::ErrorKind::NotFound {
                debug!(dir = %root.display(), "Plugin directory does not exist");
            } else {
                warn!(dir = %root.display(), error = %e, "Failed to read plugin directory");
            }
            return plugins;
        }
    };

    let mut dirs: Vec<_> = entries
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.path()),
            Err(e) => {
                warn!("Failed to read directory entry: {}", e);
                None
            }
        })
        .filter(|path| path.is_dir() && path.join(MANIFEST_FILE).exists())
        .collect();
    dirs.sort();

    let mut seen = HashSet::new();
    for dir in dirs {
        match load_plugin(&dir) {
            Ok(plugin) => {
                if !seen.insert(plugin.id.clone()) {
                    warn!(
                        plugin = %plugin.id,
                        dir = %dir.display(),
                        "Duplicate plugin id, skipping"
                    );
                    continue;
                }
                debug!(
                    plugin = %plugin.id,
                    kind = %plugin.kind(),
                    nodes = plugin.manifest.nodes.len(),
                    "Discovered plugin"
                );
                plugins.push(plugin);
            }
            Err(e) => {
                warn!(
                    dir = %dir.display(),
                    error = %e,
                    "Failed to load plugin, skipping"
                );
            }
        }
    }

    info!(dir = %root.display(), count = plugins.len(), "Plugin scan complete");
    plugins
}

/// Load a single plugin from its folder.
///
/// # Errors
/// `NodeworksError::ManifestParse` if `manifest.json` is missing, unreadable,
/// malformed, or fails [`validate_manifest`].
pub fn load_plugin(dir: &Path) -> Result<Plugin> {
    let folder_name = dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let manifest_error = |reason: String| NodeworksError::ManifestParse {
        plugin: folder_name.clone(),
        reason,
    };

    let manifest_path = dir.join(MANIFEST_FILE);
    if !manifest_path.exists() {
        return Err(manifest_error(format!(
            "No {} found in {}",
            MANIFEST_FILE,
            dir.display()
        )));
    }

    let content = fs::read_to_string(&manifest_path)
        .map_err(|e| manifest_error(format!("Failed to read {}: {}", manifest_path.display(), e)))?;

    let manifest: PluginManifest = serde_json::from_str(&content)
        .map_err(|e| manifest_error(format!("Invalid JSON: {}", e)))?;

    let plugin = Plugin::new(&folder_name, manifest, dir.to_path_buf());
    validate_manifest(&plugin.id, &plugin.manifest)?;
    Ok(plugin)
}

/// Validate a plugin manifest for correctness and safety.
///
/// Performs the following checks:
/// - Plugin id must be 1-128 characters of `[A-Za-z0-9_.-]`, starting with
///   an alphanumeric
/// - Node ids must be non-empty and unique within the plugin
/// - Event types must name a non-empty `type`
/// - An event-source `entry` must be a relative path without `..` components
pub fn validate_manifest(id: &str, manifest: &PluginManifest) -> Result<()> {
    let invalid = |reason: String| NodeworksError::ManifestParse {
        plugin: id.to_string(),
        reason,
    };

    if !PLUGIN_ID_RE.is_match(id) {
        return Err(invalid(format!(
            "Invalid plugin id '{}': must be 1-128 characters of letters, digits, '_', '.', '-', starting with a letter or digit",
            id
        )));
    }

    let mut node_ids = HashSet::new();
    for node in &manifest.nodes {
        if node.id.trim().is_empty() {
            return Err(invalid("Node with an empty id".to_string()));
        }
        if !node_ids.insert(node.id.as_str()) {
            return Err(invalid(format!("Duplicate node id '{}'", node.id)));
        }
    }

    for event_type in &manifest.event_types {
        if event_type.event_type.trim().is_empty() {
            return Err(invalid("Event type with an empty 'type'".to_string()));
        }
    }

    if manifest.kind == PluginKind::EventSource {
        if let Some(entry) = manifest.entry.as_deref() {
            validate_entry_path(entry).map_err(invalid)?;
        }
    }

    Ok(())
}

/// Reject entry paths that could escape the plugin folder.
///
/// `Path::starts_with` is component based and does not resolve traversals, so
/// `..` components are rejected outright rather than joined and compared.
fn validate_entry_path(entry: &str) -> std::result::Result<(), String> {
    let path = Path::new(entry);
    if path.is_absolute() {
        return Err(format!("Entry '{}' must be relative", entry));
    }
    if path
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
    {
        return Err(format!("Entry '{}' escapes the plugin folder", entry));
    }
    Ok(())
}
