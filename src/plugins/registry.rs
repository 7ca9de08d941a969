//! Plugin registry for Nodeworks
//!
//! `PluginRegistry` owns the plugin root folder and produces a fresh
//! [`Catalog`] on every scan; nothing is cached between queries, so a plugin
//! dropped into the folder is visible on the next request.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::error::{NodeworksError, Result};
use crate::sources::SourceStatus;

use super::loader::discover_plugins;
use super::schema::{normalize_config_schema, slugify};
use super::types::{EventSourceView, EventTypeView, NodeView, Plugin, PluginKind};

/// Entry point for catalog queries over a plugin directory.
#[derive(Debug, Clone)]
pub struct PluginRegistry {
    root: PathBuf,
}

impl PluginRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Re-read every manifest under the root.
    pub fn scan(&self) -> Catalog {
        Catalog::new(discover_plugins(&self.root))
    }

    /// [`scan`](Self::scan) on the blocking pool, for use from async code.
    pub async fn load(&self) -> Result<Catalog> {
        let registry = self.clone();
        tokio::task::spawn_blocking(move || registry.scan())
            .await
            .map_err(|e| NodeworksError::Io(std::io::Error::other(e)))
    }
}

/// How requested tags combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FilterMode {
    /// Any requested tag matches.
    #[default]
    Or,
    /// Every requested tag must be present.
    And,
}

impl std::str::FromStr for FilterMode {
    type Err = NodeworksError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "or" | "any" => Ok(FilterMode::Or),
            "and" | "all" => Ok(FilterMode::And),
            other => Err(NodeworksError::InvalidRequest(format!(
                "Unknown tag filter mode '{}', expected 'or' or 'and'",
                other
            ))),
        }
    }
}

/// Tag filter applied to catalog listings.
///
/// Tags compare case-insensitively. Exclusion is evaluated after inclusion,
/// so an item carrying both a requested and an excluded tag is dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    pub tags: Vec<String>,
    pub mode: FilterMode,
    pub exclude: Vec<String>,
}

impl TagFilter {
    /// Build a filter from comma-separated query values.
    ///
    /// ```
    /// use nodeworks::plugins::{FilterMode, TagFilter};
    /// let filter = TagFilter::parse(Some("Text, ai"), Some("and"), None).unwrap();
    /// assert_eq!(filter.tags, vec!["text", "ai"]);
    /// assert_eq!(filter.mode, FilterMode::And);
    /// ```
    pub fn parse(tags: Option<&str>, mode: Option<&str>, exclude: Option<&str>) -> Result<Self> {
        Ok(Self {
            tags: split_tags(tags),
            mode: mode
                .map(str::parse::<FilterMode>)
                .transpose()?
                .unwrap_or_default(),
            exclude: split_tags(exclude),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.exclude.is_empty()
    }

    /// Check an item's effective tags against the filter.
    pub fn matches<'a, I>(&self, item_tags: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let have: HashSet<String> = item_tags
            .into_iter()
            .map(|t| t.trim().to_lowercase())
            .collect();

        let included = self.tags.is_empty()
            || match self.mode {
                FilterMode::Or => self.tags.iter().any(|t| have.contains(t)),
                FilterMode::And => self.tags.iter().all(|t| have.contains(t)),
            };

        included && !self.exclude.iter().any(|t| have.contains(t))
    }
}

fn split_tags(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

/// A snapshot of every valid plugin found by one scan.
#[derive(Debug, Clone)]
pub struct Catalog {
    plugins: Vec<Plugin>,
    scanned_at: i64,
}

impl Catalog {
    pub fn new(plugins: Vec<Plugin>) -> Self {
        Self {
            plugins,
            scanned_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn plugins(&self) -> &[Plugin] {
        &self.plugins
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn plugin(&self, id: &str) -> Result<&Plugin> {
        self.plugins
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| NodeworksError::PluginNotFound(id.to_string()))
    }

    fn node_plugins(&self) -> impl Iterator<Item = &Plugin> {
        self.plugins
            .iter()
            .filter(|p| p.kind() == PluginKind::NodePlugin)
    }

    fn event_sources(&self) -> impl Iterator<Item = &Plugin> {
        self.plugins.iter().filter(|p| p.is_event_source())
    }

    /// All nodes across node plugins that pass the filter.
    pub fn list_nodes(&self, filter: &TagFilter) -> Vec<NodeView> {
        self.node_plugins()
            .flat_map(|plugin| self.node_views(plugin))
            .filter(|view| {
                filter.matches(
                    view.tags
                        .iter()
                        .map(String::as_str)
                        .chain(std::iter::once(view.category.as_str())),
                )
            })
            .collect()
    }

    /// Nodes of one node plugin, unfiltered.
    pub fn nodes_for_plugin(&self, plugin_id: &str) -> Result<Vec<NodeView>> {
        let plugin = self.plugin(plugin_id)?;
        Ok(self.node_views(plugin))
    }

    fn node_views(&self, plugin: &Plugin) -> Vec<NodeView> {
        plugin
            .manifest
            .nodes
            .iter()
            .map(|node| {
                let mut tags = node.tags.clone();
                for tag in &plugin.manifest.tags {
                    if !tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
                        tags.push(tag.clone());
                    }
                }
                NodeView {
                    id: node.id.clone(),
                    node_id: slugify(node.display_name()),
                    plugin_id: plugin.id.clone(),
                    plugin_name: plugin.name().to_string(),
                    name: node.display_name().to_string(),
                    description: node.description.clone(),
                    category: node.category().to_string(),
                    inputs: node.inputs.clone(),
                    outputs: node.outputs.clone(),
                    config_schema: normalize_config_schema(&plugin.id, node, self.scanned_at),
                    tags,
                }
            })
            .collect()
    }

    /// Event sources that pass the filter, each with its lifecycle status.
    ///
    /// Sources missing from `statuses` report as idle.
    pub fn list_event_sources(
        &self,
        filter: &TagFilter,
        statuses: &HashMap<String, SourceStatus>,
    ) -> Vec<EventSourceView> {
        self.event_sources()
            .filter(|p| filter.matches(p.manifest.tags.iter().map(String::as_str)))
            .map(|p| source_view(p, statuses.get(&p.id).cloned()))
            .collect()
    }

    /// Look up one event source.
    pub fn event_source(&self, id: &str) -> Result<&Plugin> {
        self.event_sources()
            .find(|p| p.id == id)
            .ok_or_else(|| NodeworksError::SourceNotFound(id.to_string()))
    }

    /// One event source with its status.
    pub fn event_source_view(
        &self,
        id: &str,
        status: Option<SourceStatus>,
    ) -> Result<EventSourceView> {
        Ok(source_view(self.event_source(id)?, status))
    }

    pub fn event_types(&self, source_id: &str) -> Result<Vec<EventTypeView>> {
        Ok(event_type_views(self.event_source(source_id)?))
    }

    /// Event types of every event source, in catalog order.
    pub fn all_event_types(&self) -> Vec<EventTypeView> {
        self.event_sources().flat_map(event_type_views).collect()
    }
}

fn source_view(plugin: &Plugin, status: Option<SourceStatus>) -> EventSourceView {
    EventSourceView {
        id: plugin.id.clone(),
        name: plugin.name().to_string(),
        description: plugin.manifest.description.clone(),
        version: plugin.manifest.version.clone(),
        event_types: plugin.manifest.event_types.clone(),
        config_schema: plugin.manifest.config_schema.clone(),
        tags: plugin.manifest.tags.clone(),
        status: status.unwrap_or_else(|| SourceStatus::idle(&plugin.id)),
    }
}

fn event_type_views(plugin: &Plugin) -> Vec<EventTypeView> {
    plugin
        .manifest
        .event_types
        .iter()
        .map(|et| EventTypeView {
            source_id: plugin.id.clone(),
            source_name: plugin.name().to_string(),
            event_type: et.event_type.clone(),
            label: et
                .label
                .clone()
                .filter(|l| !l.trim().is_empty())
                .unwrap_or_else(|| et.event_type.clone()),
            description: et.description.clone(),
            schema: et.schema.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::types::MANIFEST_FILE;
    use crate::sources::InstanceState;
    use serde_json::{json, Value};
    use std::fs;
    use tempfile::TempDir;

    fn write_manifest(root: &Path, folder: &str, manifest: Value) {
        let dir = root.join(folder);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(MANIFEST_FILE), manifest.to_string()).unwrap();
    }

    fn fixture() -> (TempDir, PluginRegistry) {
        let tmp = TempDir::new().unwrap();
        write_manifest(
            tmp.path(),
            "text-tools",
            json!({
                "name": "Text Tools",
                "tags": ["Text"],
                "nodes": [
                    {"id": "upper", "name": "Upper Case", "category": "transform", "tags": ["string"]},
                    {"id": "summarize", "name": "Summarize", "tags": ["AI"], "configSchema": {
                        "type": "object",
                        "properties": {"max_words": {"type": "integer"}}
                    }}
                ]
            }),
        );
        write_manifest(
            tmp.path(),
            "math",
            json!({
                "nodes": [{"id": "add", "name": "Add", "category": "math"}]
            }),
        );
        write_manifest(
            tmp.path(),
            "ticker",
            json!({
                "type": "event-source",
                "name": "Ticker",
                "tags": ["time"],
                "eventTypes": [{"type": "tick", "label": "Tick"}, {"type": "tock"}]
            }),
        );
        let registry = PluginRegistry::new(tmp.path());
        (tmp, registry)
    }

    // ---- scan tests ----

    #[test]
    fn test_scan_sees_new_plugins_without_restart() {
        let (tmp, registry) = fixture();
        assert_eq!(registry.scan().len(), 3);

        write_manifest(tmp.path(), "late", json!({"nodes": [{"id": "x"}]}));
        assert_eq!(registry.scan().len(), 4);
    }

    #[tokio::test]
    async fn test_load_reads_catalog_off_runtime_thread() {
        let (tmp, registry) = fixture();
        let catalog = registry.load().await.unwrap();
        assert_eq!(catalog.len(), 3);
        assert!(catalog.plugin("math").is_ok());

        write_manifest(tmp.path(), "late", json!({"nodes": [{"id": "x"}]}));
        assert_eq!(registry.load().await.unwrap().len(), 4);
    }

    #[test]
    fn test_scan_missing_root_is_empty() {
        let registry = PluginRegistry::new("/nonexistent/nodeworks/plugins");
        assert!(registry.scan().is_empty());
    }

    #[test]
    fn test_plugin_lookup() {
        let (_tmp, registry) = fixture();
        let catalog = registry.scan();
        assert_eq!(catalog.plugin("math").unwrap().id, "math");
        assert!(matches!(
            catalog.plugin("nope"),
            Err(NodeworksError::PluginNotFound(_))
        ));
    }

    // ---- node listing tests ----

    #[test]
    fn test_list_nodes_unfiltered_excludes_event_sources() {
        let (_tmp, registry) = fixture();
        let nodes = registry.scan().list_nodes(&TagFilter::default());
        let ids: Vec<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["add", "upper", "summarize"]);
    }

    #[test]
    fn test_every_node_has_config_schema() {
        let (_tmp, registry) = fixture();
        for node in registry.scan().list_nodes(&TagFilter::default()) {
            let props = node.config_schema["properties"].as_object().unwrap();
            assert!(!props.is_empty(), "node {} has empty schema", node.id);
            assert!(node.config_schema["title"]
                .as_str()
                .unwrap()
                .contains(&node.id));
        }
    }

    #[test]
    fn test_node_view_fields() {
        let (_tmp, registry) = fixture();
        let nodes = registry.scan().nodes_for_plugin("text-tools").unwrap();
        let upper = &nodes[0];
        assert_eq!(upper.node_id, "upper_case");
        assert_eq!(upper.plugin_name, "Text Tools");
        assert_eq!(upper.category, "transform");
        assert_eq!(upper.tags, vec!["string".to_string(), "Text".to_string()]);

        let summarize = &nodes[1];
        assert_eq!(summarize.category, "general");
        assert!(summarize.config_schema["properties"]["max_words"].is_object());
    }

    #[test]
    fn test_filter_or_mode_case_insensitive() {
        let (_tmp, registry) = fixture();
        let filter = TagFilter::parse(Some("ai,MATH"), None, None).unwrap();
        let ids: Vec<String> = registry
            .scan()
            .list_nodes(&filter)
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, vec!["add", "summarize"]);
    }

    #[test]
    fn test_filter_and_mode_uses_plugin_tags() {
        let (_tmp, registry) = fixture();
        let filter = TagFilter::parse(Some("text,string"), Some("and"), None).unwrap();
        let nodes = registry.scan().list_nodes(&filter);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].id, "upper");
    }

    #[test]
    fn test_filter_exclude_after_include() {
        let (_tmp, registry) = fixture();
        let filter = TagFilter::parse(Some("text"), None, Some("ai")).unwrap();
        let nodes = registry.scan().list_nodes(&filter);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].id, "upper");

        let only_exclude = TagFilter::parse(None, None, Some("transform")).unwrap();
        assert_eq!(registry.scan().list_nodes(&only_exclude).len(), 2);
    }

    #[test]
    fn test_filter_rejects_unknown_mode() {
        let err = TagFilter::parse(Some("a"), Some("xor"), None).unwrap_err();
        assert!(matches!(err, NodeworksError::InvalidRequest(_)));
    }

    // ---- event source tests ----

    #[test]
    fn test_list_event_sources_reports_idle_status() {
        let (_tmp, registry) = fixture();
        let sources = registry
            .scan()
            .list_event_sources(&TagFilter::default(), &HashMap::new());
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].id, "ticker");
        assert!(!sources[0].status.running);
        assert_eq!(sources[0].status.status, InstanceState::Stopped);
    }

    #[test]
    fn test_list_event_sources_uses_supplied_status() {
        let (_tmp, registry) = fixture();
        let mut status = SourceStatus::idle("ticker");
        status.running = true;
        status.status = InstanceState::Running;
        status.events_emitted = 3;
        let statuses = HashMap::from([("ticker".to_string(), status)]);

        let sources = registry
            .scan()
            .list_event_sources(&TagFilter::default(), &statuses);
        assert!(sources[0].status.running);
        assert_eq!(sources[0].status.events_emitted, 3);

        let filtered = registry
            .scan()
            .list_event_sources(&TagFilter::parse(Some("weather"), None, None).unwrap(), &statuses);
        assert!(filtered.is_empty());
    }

    #[test]
    fn test_event_source_lookup_rejects_node_plugins() {
        let (_tmp, registry) = fixture();
        let catalog = registry.scan();
        assert!(catalog.event_source("ticker").is_ok());
        assert!(matches!(
            catalog.event_source("math"),
            Err(NodeworksError::SourceNotFound(_))
        ));
    }

    #[test]
    fn test_event_types() {
        let (_tmp, registry) = fixture();
        let catalog = registry.scan();
        let types = catalog.event_types("ticker").unwrap();
        assert_eq!(types.len(), 2);
        assert_eq!(types[0].label, "Tick");
        assert_eq!(types[1].label, "tock");
        assert_eq!(types[1].source_name, "Ticker");

        assert_eq!(catalog.all_event_types().len(), 2);
    }
}
