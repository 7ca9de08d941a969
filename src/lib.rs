//! Nodeworks - plugin execution and event-source orchestration core
//!
//! Plugins live in folders under a root directory, each described by a
//! `manifest.json`. Node plugins run one short-lived worker per execution;
//! event sources run a long-lived worker whose stdout lines become events
//! forwarded to a trigger endpoint. Workers speak JSON over stdio.

pub mod api;
pub mod config;
pub mod error;
pub mod plugins;
pub mod sources;
pub mod utils;
pub mod worker;

pub use config::Config;
pub use error::{NodeworksError, Result};
