//! `execute` command: run one node from the terminal.

use anyhow::{bail, Context, Result};
use serde_json::Value;

use nodeworks::config::Config;
use nodeworks::plugins::PluginRegistry;
use nodeworks::worker::ExecutionDispatcher;

fn parse_object(flag: &str, raw: &str) -> Result<Value> {
    let value: Value =
        serde_json::from_str(raw).with_context(|| format!("--{} is not valid JSON", flag))?;
    if !value.is_object() {
        bail!("--{} must be a JSON object", flag);
    }
    Ok(value)
}

pub(crate) async fn cmd_execute(
    config: Config,
    plugin: &str,
    node: &str,
    inputs: &str,
    node_config: &str,
) -> Result<()> {
    let inputs = parse_object("inputs", inputs)?;
    let node_config = parse_object("config", node_config)?;

    let registry = PluginRegistry::new(config.plugins.dir.clone());
    let dispatcher = ExecutionDispatcher::new(registry, config.runtime.clone());
    let result = dispatcher
        .execute(plugin, node, inputs, node_config)
        .await
        .with_context(|| format!("Execution of {}/{} failed", plugin, node))?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
