//! Command-line interface.

pub(crate) mod catalog;
pub(crate) mod execute;
pub(crate) mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "nodeworks")]
#[command(about = "Plugin execution and event-source orchestration", long_about = None)]
pub(crate) struct Cli {
    /// Config file (defaults to $NODEWORKS_CONFIG or ~/.nodeworks/config.json)
    #[arg(long = "config-file", global = true)]
    pub config_file: Option<PathBuf>,

    /// Plugin root folder, overriding the configured one
    #[arg(long, global = true)]
    pub plugins_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Bind address
        #[arg(long)]
        host: Option<String>,
        /// Listen port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// List discovered plugins
    Plugins,
    /// List nodes, optionally filtered by tags
    Nodes {
        /// Comma-separated tags to include
        #[arg(long)]
        tags: Option<String>,
        /// `or` (any tag) or `and` (all tags)
        #[arg(long)]
        mode: Option<String>,
        /// Comma-separated tags to exclude
        #[arg(long)]
        exclude: Option<String>,
    },
    /// Execute one node and print its result
    Execute {
        /// Plugin id
        plugin: String,
        /// Node id or name slug
        node: String,
        /// Inputs as a JSON object
        #[arg(long, default_value = "{}")]
        inputs: String,
        /// Node config as a JSON object
        #[arg(long, default_value = "{}")]
        config: String,
    },
    /// Show version information
    Version,
}
