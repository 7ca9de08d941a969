//! Application state shared across all handlers.

use std::sync::Arc;

use crate::config::Config;
use crate::plugins::PluginRegistry;
use crate::sources::{EventSink, EventSourceManager};
use crate::worker::ExecutionDispatcher;

/// Passed to every handler via `State<AppState>`.
///
/// Every field is cheap to clone; the dispatcher and the event-source
/// manager share their internals across clones.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: PluginRegistry,
    pub dispatcher: ExecutionDispatcher,
    pub sources: EventSourceManager,
}

impl AppState {
    /// Wire the registry, dispatcher and manager from configuration.
    pub fn new(config: Config, sink: Arc<dyn EventSink>) -> Self {
        let registry = PluginRegistry::new(config.plugins.dir.clone());
        let dispatcher = ExecutionDispatcher::new(registry.clone(), config.runtime.clone());
        let sources = EventSourceManager::new(registry.clone(), config.runtime.clone(), sink);
        Self {
            config: Arc::new(config),
            registry,
            dispatcher,
            sources,
        }
    }
}
