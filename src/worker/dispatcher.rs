//! Execution dispatcher
//!
//! Runs one node execution per worker process: resolve the plugin and node,
//! spawn the entrypoint, write the request to stdin, wait for exit, and parse
//! the result from stdout.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::RuntimeConfig;
use crate::error::{NodeworksError, Result};
use crate::plugins::PluginRegistry;

use super::invocation::WorkerCommand;
use super::protocol::{parse_worker_output, synthesize_id, WorkerMode, WorkerRequest};

/// Lines of stdout used as diagnostics when a failing worker wrote no stderr.
const STDOUT_TAIL_LINES: usize = 20;

/// Upper bound on diagnostic text carried in a `ProcessExit` error.
const MAX_DIAGNOSTIC_CHARS: usize = 4000;

/// Outcome of one node execution.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    /// Result identifier: the payload's own string `id`, or a synthesized one.
    pub id: String,
    pub plugin_id: String,
    pub node_id: String,
    /// The payload's `success` flag; `true` when the payload has none.
    pub success: bool,
    pub data: Value,
    pub duration_ms: u64,
}

/// Dispatches node executions to worker processes.
///
/// At most `max_concurrent_workers` executions run at once; further calls
/// wait for a permit before spawning.
#[derive(Clone)]
pub struct ExecutionDispatcher {
    registry: PluginRegistry,
    runtime: RuntimeConfig,
    permits: Arc<Semaphore>,
}

impl ExecutionDispatcher {
    pub fn new(registry: PluginRegistry, runtime: RuntimeConfig) -> Self {
        let permits = Arc::new(Semaphore::new(runtime.max_concurrent_workers.max(1)));
        Self {
            registry,
            runtime,
            permits,
        }
    }

    /// Execute a node with the given inputs and config.
    ///
    /// # Errors
    /// - `PluginNotFound`, `NodeNotFound` when resolution fails
    /// - `InvalidRequest` when the plugin is an event source
    /// - `EntrypointNotFound` when the node entrypoint is missing (nothing is spawned)
    /// - `Spawn`, `ProcessExit`, `ProtocolParse` for worker failures
    pub async fn execute(
        &self,
        plugin_id: &str,
        node_id: &str,
        inputs: Value,
        config: Value,
    ) -> Result<ExecutionResult> {
        let catalog = self.registry.load().await?;
        let plugin = catalog.plugin(plugin_id)?;
        if plugin.is_event_source() {
            return Err(NodeworksError::InvalidRequest(format!(
                "'{}' is an event source and has no executable nodes",
                plugin_id
            )));
        }

        let node = plugin
            .find_node(node_id)
            .ok_or_else(|| NodeworksError::NodeNotFound {
                plugin: plugin_id.to_string(),
                node: node_id.to_string(),
            })?;

        let entrypoint = plugin.node_entrypoint(&self.runtime);
        if !entrypoint.is_file() {
            return Err(NodeworksError::EntrypointNotFound(
                entrypoint.display().to_string(),
            ));
        }

        let request_id = Uuid::new_v4().to_string();
        let request = WorkerRequest::execute(&request_id, &node.id, inputs, config);
        let command = WorkerCommand::new(
            &self.runtime.interpreter,
            &entrypoint,
            WorkerMode::Execute,
            &request_id,
        )?
        .env("NODEWORKS_PLUGIN_ID", plugin.id.clone())
        .env("NODEWORKS_NODE_ID", node.id.clone());

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| NodeworksError::Spawn(format!("Worker pool closed: {}", e)))?;

        debug!(
            plugin = %plugin.id,
            node = %node.id,
            request_id = %request_id,
            argv = ?command.argv(),
            "Spawning node worker"
        );

        let started = Instant::now();
        let value = run_worker(command, &request).await?;
        let duration_ms = started.elapsed().as_millis() as u64;

        let result = build_result(&plugin.id, &node.id, value, duration_ms);
        info!(
            plugin = %result.plugin_id,
            node = %result.node_id,
            request_id = %request_id,
            success = result.success,
            duration_ms,
            "Node execution finished"
        );
        Ok(result)
    }
}

/// Spawn, feed stdin, collect output, and parse the result.
async fn run_worker(command: WorkerCommand, request: &WorkerRequest) -> Result<Value> {
    let mut child = command
        .into_command()
        .spawn()
        .map_err(|e| NodeworksError::Spawn(e.to_string()))?;

    let line = request.to_line()?;
    if let Some(mut stdin) = child.stdin.take() {
        // A worker may exit without reading its request.
        if let Err(e) = write_request(&mut stdin, &line).await {
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                return Err(e.into());
            }
            debug!("Worker closed stdin before reading the request");
        }
    }

    let output = child.wait_with_output().await?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if !output.status.success() {
        let diagnostics = if stderr.trim().is_empty() {
            tail_lines(&stdout, STDOUT_TAIL_LINES)
        } else {
            stderr.trim().to_string()
        };
        warn!(
            code = ?output.status.code(),
            "Worker exited with failure status"
        );
        return Err(NodeworksError::ProcessExit {
            code: output.status.code(),
            diagnostics: truncate_front(&diagnostics, MAX_DIAGNOSTIC_CHARS),
        });
    }

    if !stderr.trim().is_empty() {
        debug!(stderr = %stderr.trim(), "Worker wrote to stderr");
    }

    parse_worker_output(&stdout)
}

async fn write_request(
    stdin: &mut tokio::process::ChildStdin,
    line: &str,
) -> std::io::Result<()> {
    stdin.write_all(line.as_bytes()).await?;
    stdin.shutdown().await
}

fn build_result(
    plugin_id: &str,
    node_id: &str,
    mut data: Value,
    duration_ms: u64,
) -> ExecutionResult {
    let success = data
        .get("success")
        .and_then(Value::as_bool)
        .unwrap_or(true);

    // String and numeric ids are kept; anything else is replaced so that
    // `data.id` always matches the result id.
    let id = match data.get("id") {
        Some(Value::String(existing)) => existing.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => {
            let id = synthesize_id();
            if let Value::Object(map) = &mut data {
                map.insert("id".to_string(), Value::String(id.clone()));
            }
            id
        }
    };

    ExecutionResult {
        id,
        plugin_id: plugin_id.to_string(),
        node_id: node_id.to_string(),
        success,
        data,
        duration_ms,
    }
}

fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

/// Keep the last `max` characters, where tracebacks put the useful part.
fn truncate_front(text: &str, max: usize) -> String {
    let count = text.chars().count();
    if count <= max {
        return text.to_string();
    }
    let kept: String = text.chars().skip(count - max).collect();
    format!("...{}", kept)
}
