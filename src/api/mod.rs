//! HTTP API
//!
//! Axum router exposing the plugin catalog, node execution and event-source
//! lifecycle. Handlers are thin: they parse the request, call into the
//! registry, dispatcher or manager, and wrap the result.

pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use error::ApiErrorResponse;
pub use router::{build_router, MAX_BODY_BYTES};
pub use state::AppState;
