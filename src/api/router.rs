//! Route table.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{health, nodes, plugins, sources};
use super::state::AppState;

/// Largest accepted request body; multipart uploads are the main consumer.
pub const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

/// Build the full application router.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/plugins", get(plugins::list_plugins))
        .route("/plugins/{id}", get(plugins::get_plugin))
        .route("/plugins/{id}/nodes", get(plugins::plugin_nodes))
        .route(
            "/plugins/{id}/nodes/{node}/execute",
            post(plugins::execute_node),
        )
        .route("/nodes", get(nodes::list_nodes))
        .route("/event-sources", get(sources::list_sources))
        .route("/event-sources/active", get(sources::active_sources))
        .route("/event-sources/{id}", get(sources::get_source))
        .route(
            "/event-sources/{id}/event-types",
            get(sources::source_event_types),
        )
        .route("/event-sources/{id}/start", post(sources::start_source))
        .route("/event-sources/{id}/stop", post(sources::stop_source))
        .route("/event-sources/{id}/status", get(sources::source_status))
        .route("/event-types", get(sources::all_event_types));

    Router::new()
        .route("/health", get(health::health))
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
