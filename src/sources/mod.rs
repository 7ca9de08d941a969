//! Event sources
//!
//! An event source is a plugin whose worker keeps running and prints one JSON
//! event per stdout line. The [`EventSourceManager`] owns those workers and
//! hands every captured event to an [`EventSink`], normally the
//! [`HttpForwarder`] posting to the trigger-processing endpoint.

pub mod forwarder;
pub mod instance;
pub mod manager;

pub use forwarder::{
    sink_from_config, DisabledSink, EventEnvelope, EventMetadata, EventSink, ForwardReceipt,
    HttpForwarder,
};
pub use instance::{InstanceState, SourceStatus, StopOutcome, MAX_RECORDED_ERRORS};
pub use manager::EventSourceManager;
