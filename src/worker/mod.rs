//! Worker processes for node execution
//!
//! Every execution runs in its own process: the configured interpreter runs
//! the plugin's entrypoint, reads one JSON request from stdin, and prints one
//! JSON result. See [`protocol`] for the wire contract.

pub mod dispatcher;
pub mod invocation;
pub mod protocol;

pub use dispatcher::{ExecutionDispatcher, ExecutionResult};
pub use invocation::WorkerCommand;
pub use protocol::{
    parse_worker_output, synthesize_id, WorkerMode, WorkerRequest, PROTOCOL_VERSION,
    RESULT_END_MARKER, RESULT_START_MARKER,
};
