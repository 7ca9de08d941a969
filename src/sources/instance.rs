//! Event-source instance state.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, watch};

/// Stderr lines kept per instance.
pub const MAX_RECORDED_ERRORS: usize = 100;

/// Lifecycle state of an event source.
///
/// `stopped -> starting -> running -> stopping -> {stopped | error}`; a
/// running instance that exits on its own goes straight to `stopped` or
/// `error` depending on its exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceState {
    Starting,
    Running,
    Stopping,
    Stopped,
    Error,
}

impl InstanceState {
    /// Whether a process may still be alive in this state.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            InstanceState::Starting | InstanceState::Running | InstanceState::Stopping
        )
    }
}

impl std::fmt::Display for InstanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InstanceState::Starting => "starting",
            InstanceState::Running => "running",
            InstanceState::Stopping => "stopping",
            InstanceState::Stopped => "stopped",
            InstanceState::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// Point-in-time status of one event source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceStatus {
    pub source_id: String,
    pub running: bool,
    pub status: InstanceState,
    pub pid: Option<u32>,
    pub start_time: Option<DateTime<Utc>>,
    pub last_activity: Option<DateTime<Utc>>,
    pub events_emitted: u64,
    pub errors: Vec<String>,
    pub exit_code: Option<i32>,
}

impl SourceStatus {
    /// Status of a source that has never run.
    pub fn idle(source_id: &str) -> Self {
        Self {
            source_id: source_id.to_string(),
            running: false,
            status: InstanceState::Stopped,
            pid: None,
            start_time: None,
            last_activity: None,
            events_emitted: 0,
            errors: Vec::new(),
            exit_code: None,
        }
    }
}

/// Result of a `stop` call.
#[derive(Debug, Clone, Serialize)]
pub struct StopOutcome {
    pub source_id: String,
    pub status: InstanceState,
    pub exit_code: Option<i32>,
    /// The worker ignored SIGTERM and was killed.
    pub forced: bool,
}

/// How a supervised worker ended.
#[derive(Debug, Clone)]
pub(crate) struct ExitInfo {
    pub status: InstanceState,
    pub exit_code: Option<i32>,
    pub forced: bool,
}

/// A registered instance. Lives in the manager's map from reservation until
/// its process has exited.
pub(crate) struct ActiveInstance {
    pub source_id: String,
    pub state: InstanceState,
    pub pid: Option<u32>,
    pub start_time: DateTime<Utc>,
    pub last_activity: Option<DateTime<Utc>>,
    pub events_emitted: u64,
    pub errors: VecDeque<String>,
    /// Taken by the first `stop` call.
    pub stop_tx: Option<oneshot::Sender<()>>,
    /// Set once by the supervisor when the process is gone.
    pub exit_rx: Option<watch::Receiver<Option<ExitInfo>>>,
}

impl ActiveInstance {
    /// Placeholder inserted while the worker is being spawned.
    pub fn reserve(source_id: &str) -> Self {
        Self {
            source_id: source_id.to_string(),
            state: InstanceState::Starting,
            pid: None,
            start_time: Utc::now(),
            last_activity: None,
            events_emitted: 0,
            errors: VecDeque::new(),
            stop_tx: None,
            exit_rx: None,
        }
    }

    pub fn record_event(&mut self) {
        self.events_emitted += 1;
        self.last_activity = Some(Utc::now());
    }

    pub fn record_error(&mut self, line: String) {
        if self.errors.len() == MAX_RECORDED_ERRORS {
            self.errors.pop_front();
        }
        self.errors.push_back(line);
        self.last_activity = Some(Utc::now());
    }

    pub fn status(&self) -> SourceStatus {
        SourceStatus {
            source_id: self.source_id.clone(),
            running: self.state.is_live(),
            status: self.state,
            pid: self.pid,
            start_time: Some(self.start_time),
            last_activity: self.last_activity,
            events_emitted: self.events_emitted,
            errors: self.errors.iter().cloned().collect(),
            exit_code: None,
        }
    }

    /// Final status after the process has exited.
    pub fn into_exit_status(self, exit: &ExitInfo) -> SourceStatus {
        SourceStatus {
            running: false,
            status: exit.status,
            exit_code: exit.exit_code,
            ..self.status()
        }
    }
}
