//! Utility modules for Nodeworks

pub mod logging;
pub mod process;
pub mod shutdown;

pub use shutdown::shutdown_signal;
