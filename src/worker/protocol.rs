//! JSON-over-stdio worker protocol
//!
//! A worker receives one [`WorkerRequest`] as a single JSON line on stdin.
//! Node workers answer with one JSON result on stdout, either framed between
//! [`RESULT_START_MARKER`] and [`RESULT_END_MARKER`] or as the last non-empty
//! stdout line. Everything else a worker prints is diagnostic.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{NodeworksError, Result};

/// Protocol identifier sent in every request and in `NODEWORKS_PROTOCOL`.
pub const PROTOCOL_VERSION: &str = "nodeworks/1";

/// Marker for start of a framed result in stdout
pub const RESULT_START_MARKER: &str = "<<<NODEWORKS_RESULT_START>>>";

/// Marker for end of a framed result in stdout
pub const RESULT_END_MARKER: &str = "<<<NODEWORKS_RESULT_END>>>";

const PREVIEW_LINES: usize = 3;
const PREVIEW_LINE_CHARS: usize = 200;

/// What the worker is being asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkerMode {
    /// Run one node once and print a result.
    Execute,
    /// Run until terminated, printing one JSON event per line.
    EventSource,
}

impl WorkerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerMode::Execute => "execute",
            WorkerMode::EventSource => "event-source",
        }
    }
}

/// Request written to a worker's stdin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub protocol: String,
    pub request_id: String,
    pub mode: WorkerMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub inputs: Value,
    #[serde(default)]
    pub config: Value,
}

impl WorkerRequest {
    /// Request to execute a single node.
    pub fn execute(request_id: &str, node_id: &str, inputs: Value, config: Value) -> Self {
        Self {
            protocol: PROTOCOL_VERSION.to_string(),
            request_id: request_id.to_string(),
            mode: WorkerMode::Execute,
            node_id: Some(node_id.to_string()),
            source_id: None,
            inputs: object_or_empty(inputs),
            config: object_or_empty(config),
        }
    }

    /// Init request for a long-running event source.
    pub fn event_source(request_id: &str, source_id: &str, config: Value) -> Self {
        Self {
            protocol: PROTOCOL_VERSION.to_string(),
            request_id: request_id.to_string(),
            mode: WorkerMode::EventSource,
            node_id: None,
            source_id: Some(source_id.to_string()),
            inputs: Value::Null,
            config: object_or_empty(config),
        }
    }

    /// Serialize as one newline-terminated line.
    pub fn to_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

fn object_or_empty(value: Value) -> Value {
    if value.is_null() {
        Value::Object(Default::default())
    } else {
        value
    }
}

/// Identifier attached to results: `<unix-millis>-<8 hex chars>`.
pub fn synthesize_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}",
        chrono::Utc::now().timestamp_millis(),
        &suffix[..8]
    )
}

/// Extract the JSON between the last start marker and the end marker after it.
fn framed_result(stdout: &str) -> Option<&str> {
    let start = stdout.rfind(RESULT_START_MARKER)?;
    let json_start = start + RESULT_START_MARKER.len();
    let end = stdout[json_start..].find(RESULT_END_MARKER)? + json_start;
    stdout.get(json_start..end).map(str::trim)
}

/// Parse a node worker's stdout into its result value.
///
/// # Errors
/// `NodeworksError::ProtocolParse` when there is no output or the result text
/// is not JSON. The error names the total line count and previews the first
/// and last lines.
pub fn parse_worker_output(stdout: &str) -> Result<Value> {
    let lines: Vec<&str> = stdout.lines().filter(|l| !l.trim().is_empty()).collect();

    let candidate = match framed_result(stdout) {
        Some(framed) => framed,
        None => match lines.last() {
            Some(last) => last.trim(),
            None => {
                return Err(NodeworksError::ProtocolParse {
                    line_count: 0,
                    reason: "worker produced no output".to_string(),
                    preview: String::new(),
                })
            }
        },
    };

    serde_json::from_str(candidate).map_err(|e| NodeworksError::ProtocolParse {
        line_count: lines.len(),
        reason: e.to_string(),
        preview: preview(&lines),
    })
}

/// `[n] text` for the first and last few lines, `...` between them.
fn preview(lines: &[&str]) -> String {
    let render = |i: usize, line: &str| {
        let line = line.trim();
        let text: String = line.chars().take(PREVIEW_LINE_CHARS).collect();
        if text.len() < line.len() {
            format!("[{}] {}...", i + 1, text)
        } else {
            format!("[{}] {}", i + 1, text)
        }
    };

    if lines.len() <= PREVIEW_LINES * 2 {
        return lines
            .iter()
            .enumerate()
            .map(|(i, l)| render(i, l))
            .collect::<Vec<_>>()
            .join(" | ");
    }

    let head = lines[..PREVIEW_LINES]
        .iter()
        .enumerate()
        .map(|(i, l)| render(i, l));
    let tail_start = lines.len() - PREVIEW_LINES;
    let tail = lines[tail_start..]
        .iter()
        .enumerate()
        .map(|(i, l)| render(tail_start + i, l));

    head.chain(std::iter::once("...".to_string()))
        .chain(tail)
        .collect::<Vec<_>>()
        .join(" | ")
}
