//! Configuration for Nodeworks
//!
//! Configuration is read from `$NODEWORKS_CONFIG` or `~/.nodeworks/config.json`,
//! falling back to defaults when the file does not exist. Every section is
//! optional. Environment variables (optionally loaded from a `.env` file) are
//! applied on top of the file.
//!
//! # Example config.json
//!
//! ```json
//! {
//!   "server": { "host": "0.0.0.0", "port": 8080 },
//!   "plugins": { "dir": "./plugins" },
//!   "runtime": {
//!     "interpreter": ["python3", "-u"],
//!     "node_entrypoint": "main.py",
//!     "max_concurrent_workers": 4
//!   },
//!   "forwarding": { "endpoint": "http://localhost:8000/api/triggers/process" },
//!   "logging": { "level": "debug", "format": "json" }
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{NodeworksError, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub plugins: PluginsConfig,
    pub runtime: RuntimeConfig,
    pub forwarding: ForwardingConfig,
    pub logging: LoggingConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Where multipart file attachments are stored while a worker runs. Each file
    /// is removed once the execution that received it has finished.
    pub upload_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            upload_dir: std::env::temp_dir().join("nodeworks-uploads"),
        }
    }
}

/// Plugin directory settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginsConfig {
    /// Root folder holding one subfolder per plugin.
    pub dir: PathBuf,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("plugins"),
        }
    }
}

/// How worker processes are launched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Program and leading arguments; the entrypoint path is appended.
    pub interpreter: Vec<String>,
    /// Entrypoint of a node plugin, relative to its folder.
    pub node_entrypoint: String,
    /// Entry used for event sources whose manifest declares none.
    pub event_source_entrypoint: String,
    /// Upper bound on simultaneously running node executions.
    pub max_concurrent_workers: usize,
    /// Seconds an event source gets to exit after SIGTERM before it is killed.
    pub stop_grace_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            interpreter: vec!["python3".to_string(), "-u".to_string()],
            node_entrypoint: "main.py".to_string(),
            event_source_entrypoint: "source.py".to_string(),
            max_concurrent_workers: 8,
            stop_grace_secs: 5,
        }
    }
}

/// Where captured events are sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwardingConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "http://127.0.0.1:8000/api/triggers/process".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Log output settings. `RUST_LOG` takes precedence over `level`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Directory holding user-level configuration (`~/.nodeworks`).
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".nodeworks")
    }

    /// Path of the configuration file, honouring `NODEWORKS_CONFIG`.
    pub fn path() -> PathBuf {
        std::env::var_os("NODEWORKS_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| Self::dir().join("config.json"))
    }

    /// Load configuration from the default location and apply env overrides.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let mut config = Self::load_from(&Self::path())?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific file. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            NodeworksError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            NodeworksError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Apply `NODEWORKS_*` overrides using the given variable lookup.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("NODEWORKS_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("NODEWORKS_PORT") {
            self.server.port = parse_env("NODEWORKS_PORT", &port)?;
        }
        if let Some(dir) = lookup("NODEWORKS_UPLOAD_DIR") {
            self.server.upload_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("NODEWORKS_PLUGINS_DIR") {
            self.plugins.dir = PathBuf::from(dir);
        }
        if let Some(interpreter) = lookup("NODEWORKS_INTERPRETER") {
            let argv: Vec<String> = interpreter.split_whitespace().map(String::from).collect();
            if argv.is_empty() {
                return Err(NodeworksError::Config(
                    "NODEWORKS_INTERPRETER must not be empty".to_string(),
                ));
            }
            self.runtime.interpreter = argv;
        }
        if let Some(max) = lookup("NODEWORKS_MAX_WORKERS") {
            self.runtime.max_concurrent_workers = parse_env("NODEWORKS_MAX_WORKERS", &max)?;
        }
        if let Some(grace) = lookup("NODEWORKS_STOP_GRACE_SECS") {
            self.runtime.stop_grace_secs = parse_env("NODEWORKS_STOP_GRACE_SECS", &grace)?;
        }
        if let Some(url) = lookup("NODEWORKS_TRIGGER_URL") {
            self.forwarding.endpoint = url;
        }
        if let Some(enabled) = lookup("NODEWORKS_FORWARDING_ENABLED") {
            self.forwarding.enabled = parse_env("NODEWORKS_FORWARDING_ENABLED", &enabled)?;
        }
        if let Some(level) = lookup("NODEWORKS_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("NODEWORKS_LOG_FORMAT") {
            self.logging.format = format;
        }
        Ok(())
    }

    /// Check values that serde cannot reject on its own.
    pub fn validate(&self) -> Result<()> {
        if self.runtime.interpreter.is_empty() {
            return Err(NodeworksError::Config(
                "runtime.interpreter must name a program".to_string(),
            ));
        }
        if self.runtime.max_concurrent_workers == 0 {
            return Err(NodeworksError::Config(
                "runtime.max_concurrent_workers must be at least 1".to_string(),
            ));
        }
        if self.forwarding.enabled && self.forwarding.endpoint.trim().is_empty() {
            return Err(NodeworksError::Config(
                "forwarding.endpoint is required when forwarding is enabled".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| NodeworksError::Config(format!("Invalid value for {}: '{}'", key, value)))
}
