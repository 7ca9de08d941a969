mod cli;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, Commands};
use nodeworks::config::Config;
use nodeworks::utils::logging;

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config_file {
        Some(path) => {
            let _ = dotenvy::dotenv();
            let mut config = Config::load_from(path)?;
            config.apply_env_overrides(|key| std::env::var(key).ok())?;
            config
        }
        None => Config::load()?,
    };
    if let Some(dir) = &cli.plugins_dir {
        config.plugins.dir = dir.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(&cli).context("Failed to load configuration")?;
    if let Some(Commands::Serve { host, port }) = &cli.command {
        if let Some(host) = host {
            config.server.host = host.clone();
        }
        if let Some(port) = port {
            config.server.port = *port;
        }
    }
    config.validate()?;
    logging::init(&config.logging)?;

    match cli.command {
        Some(Commands::Version) | None => {
            println!("nodeworks {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Serve { .. }) => cli::serve::cmd_serve(config).await?,
        Some(Commands::Plugins) => cli::catalog::cmd_plugins(&config)?,
        Some(Commands::Nodes {
            tags,
            mode,
            exclude,
        }) => cli::catalog::cmd_nodes(
            &config,
            tags.as_deref(),
            mode.as_deref(),
            exclude.as_deref(),
        )?,
        Some(Commands::Execute {
            plugin,
            node,
            inputs,
            config: node_config,
        }) => cli::execute::cmd_execute(config, &plugin, &node, &inputs, &node_config).await?,
    }

    Ok(())
}
