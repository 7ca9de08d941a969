//! Plugin catalog for Nodeworks
//!
//! Plugins are folders under a root directory, each described by a
//! `manifest.json`. A node plugin declares nodes that run in a short-lived
//! worker per execution; an event source declares event types and runs as a
//! long-lived worker whose output lines are captured as events.
//!
//! # Architecture
//!
//! - **types**: Manifest structures, the loaded `Plugin`, and API views
//! - **loader**: Folder discovery and manifest validation
//! - **schema**: Node slugs and config schema normalization
//! - **registry**: `PluginRegistry` and the per-scan `Catalog` with tag filtering
//!
//! # Plugin Directory Structure
//!
//! ```text
//! plugins/
//! ├── echo-plugin/
//! │   ├── manifest.json
//! │   └── main.py
//! └── ticker/
//!     ├── manifest.json
//!     └── source.py
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use nodeworks::plugins::{PluginRegistry, TagFilter};
//!
//! let registry = PluginRegistry::new("./plugins");
//! let catalog = registry.scan();
//! for node in catalog.list_nodes(&TagFilter::default()) {
//!     println!("{}:{} ({})", node.plugin_id, node.id, node.category);
//! }
//! ```

mod loader;
pub mod registry;
pub mod schema;
pub mod types;

pub use loader::{discover_plugins, load_plugin, validate_manifest};
pub use registry::{Catalog, FilterMode, PluginRegistry, TagFilter};
pub use schema::{default_config_schema, normalize_config_schema, slugify};
pub use types::{
    EventSourceView, EventTypeDef, EventTypeView, NodeDef, NodeView, Plugin, PluginKind,
    PluginManifest, PluginSummary, MANIFEST_FILE,
};
