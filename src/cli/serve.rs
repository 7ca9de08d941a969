//! `serve` command: run the HTTP API until SIGINT/SIGTERM.

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

use nodeworks::api::{build_router, AppState};
use nodeworks::config::Config;
use nodeworks::sources::sink_from_config;
use nodeworks::utils::shutdown_signal;

pub(crate) async fn cmd_serve(config: Config) -> Result<()> {
    let sink = sink_from_config(&config.forwarding).context("Failed to build event forwarder")?;
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config, sink);

    let catalog = state.registry.scan();
    info!(
        plugins_dir = %state.registry.root().display(),
        plugins = catalog.len(),
        "Plugin catalog loaded"
    );

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(addr = %addr, "Nodeworks API listening");

    axum::serve(listener, build_router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    let stopped = state.sources.stop_all().await;
    info!(count = stopped.len(), "Event sources stopped, shutting down");
    Ok(())
}
