//! Error types for Nodeworks
//!
//! This module defines all error types used throughout the orchestration core.
//! Uses `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations.

use thiserror::Error;

/// The primary error type for Nodeworks operations.
#[derive(Error, Debug)]
pub enum NodeworksError {
    /// A plugin manifest could not be read, parsed or validated.
    /// Discovery swallows these per folder; they only surface from direct loads.
    #[error("Manifest error in {plugin}: {reason}")]
    ManifestParse { plugin: String, reason: String },

    /// No plugin with the given id exists in the plugin directory.
    #[error("Plugin not found: {0}")]
    PluginNotFound(String),

    /// The plugin exists but declares no node with the given id.
    #[error("Node '{node}' not found in plugin '{plugin}'")]
    NodeNotFound { plugin: String, node: String },

    /// No event source with the given id exists in the plugin directory.
    #[error("Event source not found: {0}")]
    SourceNotFound(String),

    /// The entrypoint file a worker would run does not exist.
    #[error("Entrypoint not found: {0}")]
    EntrypointNotFound(String),

    /// A worker exited with a non-zero status.
    #[error("Worker {}: {diagnostics}", describe_exit(code))]
    ProcessExit {
        code: Option<i32>,
        diagnostics: String,
    },

    /// A worker's output did not end in a parseable JSON result.
    #[error("Failed to parse worker result ({line_count} output lines): {reason}; preview: {preview}")]
    ProtocolParse {
        line_count: usize,
        reason: String,
        preview: String,
    },

    /// The OS refused to spawn a worker process.
    #[error("Failed to spawn worker: {0}")]
    Spawn(String),

    /// An instance for this event source is already registered.
    #[error("Event source '{0}' is already running")]
    LifecycleConflict(String),

    /// Stop was requested for an event source with no active instance.
    #[error("Event source '{0}' is not running")]
    NotRunning(String),

    /// A worker ignored graceful termination and had to be killed.
    #[error("Worker for '{0}' did not exit within the grace period and was killed")]
    ForceKillEscalation(String),

    /// Forwarding an event to the trigger endpoint failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The caller sent something we cannot act on.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration-related errors (invalid config file, bad overrides, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with code {}", code),
        None => "was killed by a signal".to_string(),
    }
}

impl NodeworksError {
    /// Short machine-readable code, used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            NodeworksError::ManifestParse { .. } => "MANIFEST_PARSE_ERROR",
            NodeworksError::PluginNotFound(_) => "PLUGIN_NOT_FOUND",
            NodeworksError::NodeNotFound { .. } => "NODE_NOT_FOUND",
            NodeworksError::SourceNotFound(_) => "SOURCE_NOT_FOUND",
            NodeworksError::EntrypointNotFound(_) => "ENTRYPOINT_NOT_FOUND",
            NodeworksError::ProcessExit { .. } => "PROCESS_EXIT_ERROR",
            NodeworksError::ProtocolParse { .. } => "PROTOCOL_PARSE_ERROR",
            NodeworksError::Spawn(_) => "SPAWN_ERROR",
            NodeworksError::LifecycleConflict(_) => "LIFECYCLE_CONFLICT",
            NodeworksError::NotRunning(_) => "NOT_RUNNING",
            NodeworksError::ForceKillEscalation(_) => "FORCE_KILL_ESCALATION",
            NodeworksError::Transport(_) => "TRANSPORT_ERROR",
            NodeworksError::InvalidRequest(_) => "INVALID_REQUEST",
            NodeworksError::Config(_) => "CONFIG_ERROR",
            NodeworksError::Io(_) => "IO_ERROR",
            NodeworksError::Json(_) => "JSON_ERROR",
            NodeworksError::Http(_) => "HTTP_ERROR",
        }
    }
}

/// A specialized `Result` type for Nodeworks operations.
pub type Result<T> = std::result::Result<T, NodeworksError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NodeworksError::Config("missing plugins dir".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing plugins dir");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: NodeworksError = io_err.into();
        assert!(matches!(err, NodeworksError::Io(_)));
    }

    #[test]
    fn test_process_exit_display_includes_diagnostics() {
        let err = NodeworksError::ProcessExit {
            code: Some(3),
            diagnostics: "Traceback: boom".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("exited with code 3"));
        assert!(!msg.contains("Some("));
        assert!(msg.contains("Traceback: boom"));
    }

    #[test]
    fn test_process_exit_display_without_code() {
        let err = NodeworksError::ProcessExit {
            code: None,
            diagnostics: String::new(),
        };
        assert_eq!(err.to_string(), "Worker was killed by a signal: ");
    }

    #[test]
    fn test_protocol_parse_display_includes_context() {
        let err = NodeworksError::ProtocolParse {
            line_count: 4,
            reason: "expected value".to_string(),
            preview: "[1] loading | [4] not json".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("4 output lines"));
        assert!(msg.contains("not json"));
    }

    #[test]
    fn test_error_codes_are_distinct_for_lifecycle() {
        assert_eq!(
            NodeworksError::LifecycleConflict("a".into()).code(),
            "LIFECYCLE_CONFLICT"
        );
        assert_eq!(NodeworksError::NotRunning("a".into()).code(), "NOT_RUNNING");
    }
}
