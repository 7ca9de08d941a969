//! Tracing subscriber setup.

use std::io::{self, IsTerminal};

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{NodeworksError, Result};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `logging.level` when set. Output goes to stderr so
/// that subcommands printing JSON to stdout stay machine-readable.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            NodeworksError::Config(format!("Invalid log level '{}': {}", config.level, e))
        })?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr);

    let installed = match config.format.as_str() {
        "json" => builder.json().try_init(),
        "pretty" | "" => builder.with_ansi(io::stderr().is_terminal()).try_init(),
        other => {
            return Err(NodeworksError::Config(format!(
                "Unknown log format '{}', expected 'pretty' or 'json'",
                other
            )))
        }
    };

    installed.map_err(|e| NodeworksError::Config(format!("Failed to install logger: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_rejects_unknown_format() {
        let config = LoggingConfig {
            level: "info".to_string(),
            format: "xml".to_string(),
        };
        assert!(init(&config).is_err());
    }
}
