//! `plugins` and `nodes` commands: print the catalog as JSON.

use anyhow::Result;

use nodeworks::config::Config;
use nodeworks::plugins::{PluginRegistry, PluginSummary, TagFilter};

pub(crate) fn cmd_plugins(config: &Config) -> Result<()> {
    let catalog = PluginRegistry::new(config.plugins.dir.clone()).scan();
    let summaries: Vec<PluginSummary> = catalog.plugins().iter().map(|p| p.summary()).collect();
    println!("{}", serde_json::to_string_pretty(&summaries)?);
    Ok(())
}

pub(crate) fn cmd_nodes(
    config: &Config,
    tags: Option<&str>,
    mode: Option<&str>,
    exclude: Option<&str>,
) -> Result<()> {
    let filter = TagFilter::parse(tags, mode, exclude)?;
    let catalog = PluginRegistry::new(config.plugins.dir.clone()).scan();
    println!("{}", serde_json::to_string_pretty(&catalog.list_nodes(&filter))?);
    Ok(())
}
