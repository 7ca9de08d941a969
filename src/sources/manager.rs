//! Event-source lifecycle manager
//!
//! The `EventSourceManager` owns every running event-source worker. Each
//! instance gets a supervisor task that waits for the process to exit (on its
//! own or after a stop request), and two reader tasks that turn stdout lines
//! into forwarded events and stderr lines into recorded errors.
//!
//! # Architecture
//!
//! ```text
//!   start(id) ──► spawn worker ──► supervisor ──► exit record
//!                     │  stdout ──► JSON line? ──► events_emitted += 1 ──► EventSink
//!                     │  stderr ──► errors[] (last 100)
//!   stop(id) ─────────┴─► SIGTERM ─► grace period ─► kill
//! ```

use std::collections::HashMap;
use std::io;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout};
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::RuntimeConfig;
use crate::error::{NodeworksError, Result};
use crate::plugins::PluginRegistry;
use crate::utils::process::terminate;
use crate::worker::{WorkerCommand, WorkerMode, WorkerRequest};

use super::forwarder::{deliver, EventEnvelope, EventSink};
use super::instance::{ActiveInstance, ExitInfo, InstanceState, SourceStatus, StopOutcome};

/// How long output readers may keep running after the worker has exited.
const READER_DRAIN: Duration = Duration::from_secs(2);

#[derive(Default)]
struct ManagerState {
    active: HashMap<String, ActiveInstance>,
    /// Final status of instances that have left `active`.
    exits: HashMap<String, SourceStatus>,
}

type SharedState = Arc<Mutex<ManagerState>>;

/// Starts, stops and tracks event-source workers.
///
/// Cloning is cheap and clones share the same instances. Separate
/// `EventSourceManager::new` calls produce fully independent managers.
#[derive(Clone)]
pub struct EventSourceManager {
    registry: PluginRegistry,
    runtime: RuntimeConfig,
    sink: Arc<dyn EventSink>,
    state: SharedState,
}

impl EventSourceManager {
    pub fn new(
        registry: PluginRegistry,
        runtime: RuntimeConfig,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            registry,
            runtime,
            sink,
            state: Arc::new(Mutex::new(ManagerState::default())),
        }
    }

    /// Start an event source.
    ///
    /// The id is reserved under the lock before anything is spawned, so two
    /// concurrent starts for one id cannot both launch a worker. The lock is
    /// released while the worker is spawned, and the init request is written
    /// by a background task, so a worker that never reads stdin cannot stall
    /// other sources.
    ///
    /// # Errors
    /// - `LifecycleConflict` if an instance is already registered
    /// - `SourceNotFound`, `EntrypointNotFound`, `Spawn` if the worker cannot be launched
    pub async fn start(&self, source_id: &str, config: Value) -> Result<SourceStatus> {
        {
            let mut state = self.state.lock().await;
            if state.active.contains_key(source_id) {
                return Err(NodeworksError::LifecycleConflict(source_id.to_string()));
            }
            state
                .active
                .insert(source_id.to_string(), ActiveInstance::reserve(source_id));
        }

        let spawned = self.spawn_worker(source_id, config).await;

        let mut state = self.state.lock().await;
        let (mut child, stdin, init_line) = match spawned {
            Ok(spawned) => spawned,
            Err(e) => {
                state.active.remove(source_id);
                warn!(source = %source_id, error = %e, "Event source failed to start");
                return Err(e);
            }
        };

        let pid = child.id();
        let (stop_tx, stop_rx) = oneshot::channel();
        let (exit_tx, exit_rx) = watch::channel(None);

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_stdout_reader(
                stdout,
                source_id.to_string(),
                self.state.clone(),
                self.sink.clone(),
            ));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_stderr_reader(
                stderr,
                source_id.to_string(),
                self.state.clone(),
            ));
        }
        let init_writer = spawn_init_writer(stdin, init_line, source_id.to_string());

        // Registered before the supervisor can observe an exit.
        state.exits.remove(source_id);
        let instance = state
            .active
            .entry(source_id.to_string())
            .or_insert_with(|| ActiveInstance::reserve(source_id));
        instance.state = InstanceState::Running;
        instance.pid = pid;
        instance.stop_tx = Some(stop_tx);
        instance.exit_rx = Some(exit_rx);
        let status = instance.status();

        tokio::spawn(supervise(Supervision {
            source_id: source_id.to_string(),
            child,
            init_writer,
            stop_rx,
            exit_tx,
            readers,
            grace: Duration::from_secs(self.runtime.stop_grace_secs),
            state: self.state.clone(),
        }));

        info!(source = %source_id, pid = ?pid, "Event source started");
        Ok(status)
    }

    /// Resolve the entry and spawn the worker. Returns the init line to send.
    async fn spawn_worker(
        &self,
        source_id: &str,
        config: Value,
    ) -> Result<(Child, ChildStdin, String)> {
        let catalog = self.registry.load().await?;
        let plugin = catalog.event_source(source_id)?;

        let entrypoint = plugin.source_entrypoint(&self.runtime);
        if !entrypoint.is_file() {
            return Err(NodeworksError::EntrypointNotFound(
                entrypoint.display().to_string(),
            ));
        }

        let request_id = Uuid::new_v4().to_string();
        let init_line = WorkerRequest::event_source(&request_id, source_id, config).to_line()?;
        let command = WorkerCommand::new(
            &self.runtime.interpreter,
            &entrypoint,
            WorkerMode::EventSource,
            &request_id,
        )?
        .env("NODEWORKS_SOURCE_ID", source_id);

        debug!(source = %source_id, argv = ?command.argv(), "Spawning event source worker");

        let mut child = command
            .into_command()
            .spawn()
            .map_err(|e| NodeworksError::Spawn(format!("{}: {}", entrypoint.display(), e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| NodeworksError::Spawn("worker stdin was not captured".to_string()))?;

        Ok((child, stdin, init_line))
    }

    /// Stop a running event source.
    ///
    /// Sends SIGTERM, waits up to `stop_grace_secs`, then kills the worker.
    /// Returns once the process has exited and the instance is deregistered.
    ///
    /// # Errors
    /// `NotRunning` if no instance is registered for `source_id`.
    pub async fn stop(&self, source_id: &str) -> Result<StopOutcome> {
        let (stop_tx, exit_rx) = {
            let mut state = self.state.lock().await;
            let instance = state
                .active
                .get_mut(source_id)
                .ok_or_else(|| NodeworksError::NotRunning(source_id.to_string()))?;
            if instance.state == InstanceState::Starting {
                return Err(NodeworksError::LifecycleConflict(source_id.to_string()));
            }
            instance.state = InstanceState::Stopping;
            (instance.stop_tx.take(), instance.exit_rx.clone())
        };

        info!(source = %source_id, "Stopping event source");
        if let Some(tx) = stop_tx {
            let _ = tx.send(());
        }

        let exit = match exit_rx {
            Some(rx) => wait_for_exit(rx).await,
            None => None,
        };
        let exit = exit.ok_or_else(|| NodeworksError::NotRunning(source_id.to_string()))?;

        Ok(StopOutcome {
            source_id: source_id.to_string(),
            status: exit.status,
            exit_code: exit.exit_code,
            forced: exit.forced,
        })
    }

    /// Stop every registered instance in parallel.
    pub async fn stop_all(&self) -> Vec<StopOutcome> {
        let ids: Vec<String> = {
            let state = self.state.lock().await;
            state.active.keys().cloned().collect()
        };
        if ids.is_empty() {
            return Vec::new();
        }

        info!(count = ids.len(), "Stopping all event sources");
        let results = futures::future::join_all(ids.iter().map(|id| self.stop(id))).await;

        results
            .into_iter()
            .zip(ids)
            .filter_map(|(result, id)| match result {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    debug!(source = %id, error = %e, "Event source already gone");
                    None
                }
            })
            .collect()
    }

    /// Current status; the exit record when it has stopped, idle when it never ran.
    pub async fn status(&self, source_id: &str) -> SourceStatus {
        let state = self.state.lock().await;
        if let Some(instance) = state.active.get(source_id) {
            instance.status()
        } else if let Some(exited) = state.exits.get(source_id) {
            exited.clone()
        } else {
            SourceStatus::idle(source_id)
        }
    }

    pub async fn is_running(&self, source_id: &str) -> bool {
        self.state.lock().await.active.contains_key(source_id)
    }

    /// Status of every registered instance, ordered by id.
    pub async fn active(&self) -> Vec<SourceStatus> {
        let state = self.state.lock().await;
        let mut statuses: Vec<SourceStatus> =
            state.active.values().map(ActiveInstance::status).collect();
        statuses.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        statuses
    }

    /// Every known status keyed by source id, for catalog listings.
    pub async fn snapshot(&self) -> HashMap<String, SourceStatus> {
        let state = self.state.lock().await;
        let mut all = state.exits.clone();
        for (id, instance) in &state.active {
            all.insert(id.clone(), instance.status());
        }
        all
    }
}

async fn write_init(stdin: &mut ChildStdin, line: &str) -> io::Result<()> {
    stdin.write_all(line.as_bytes()).await?;
    stdin.flush().await
}

/// Send the init request, then hold stdin open until the supervisor aborts the task.
fn spawn_init_writer(mut stdin: ChildStdin, line: String, source_id: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = write_init(&mut stdin, &line).await {
            // The supervisor records how the worker ended.
            debug!(source = %source_id, error = %e, "Event source closed stdin early");
        }
        std::future::pending::<()>().await;
    })
}

async fn wait_for_exit(mut rx: watch::Receiver<Option<ExitInfo>>) -> Option<ExitInfo> {
    let exit = rx.wait_for(Option::is_some).await.ok()?.clone();
    exit
}

fn spawn_stdout_reader(
    stdout: ChildStdout,
    source_id: String,
    state: SharedState,
    sink: Arc<dyn EventSink>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<Value>(line) {
                        Ok(value) => {
                            if let Some(instance) = state.lock().await.active.get_mut(&source_id) {
                                instance.record_event();
                            }
                            let envelope = EventEnvelope::from_line(&source_id, value);
                            debug!(
                                source = %source_id,
                                event_type = %envelope.event_type,
                                "Event captured"
                            );
                            let sink = sink.clone();
                            tokio::spawn(async move {
                                deliver(sink.as_ref(), envelope).await;
                            });
                        }
                        Err(_) => debug!(source = %source_id, output = %line, "Event source output"),
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(source = %source_id, error = %e, "Failed to read event source stdout");
                    break;
                }
            }
        }
    })
}

fn spawn_stderr_reader(
    stderr: ChildStderr,
    source_id: String,
    state: SharedState,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim_end().to_string();
            if line.trim().is_empty() {
                continue;
            }
            warn!(source = %source_id, stderr = %line, "Event source stderr");
            if let Some(instance) = state.lock().await.active.get_mut(&source_id) {
                instance.record_error(line);
            }
        }
    })
}

struct Supervision {
    source_id: String,
    child: Child,
    /// Owns stdin for the life of the worker.
    init_writer: JoinHandle<()>,
    stop_rx: oneshot::Receiver<()>,
    exit_tx: watch::Sender<Option<ExitInfo>>,
    readers: Vec<JoinHandle<()>>,
    grace: Duration,
    state: SharedState,
}

/// Wait for the worker to exit, then record the outcome and deregister it.
async fn supervise(supervision: Supervision) {
    let Supervision {
        source_id,
        mut child,
        init_writer,
        mut stop_rx,
        exit_tx,
        readers,
        grace,
        state,
    } = supervision;

    let (status, requested, forced) = tokio::select! {
        status = child.wait() => (status, false, false),
        _ = &mut stop_rx => {
            let (status, forced) = shut_down(&source_id, &mut child, grace).await;
            (status, true, forced)
        }
    };
    init_writer.abort();

    for mut reader in readers {
        if tokio::time::timeout(READER_DRAIN, &mut reader).await.is_err() {
            reader.abort();
        }
    }

    let exit_code = status.as_ref().ok().and_then(ExitStatus::code);
    let final_state = if requested || exit_code == Some(0) {
        InstanceState::Stopped
    } else {
        InstanceState::Error
    };
    let exit = ExitInfo {
        status: final_state,
        exit_code,
        forced,
    };

    {
        let mut state = state.lock().await;
        if let Some(instance) = state.active.remove(&source_id) {
            let record = instance.into_exit_status(&exit);
            state.exits.insert(source_id.clone(), record);
        }
    }

    match (&status, final_state) {
        (Err(e), _) => warn!(source = %source_id, error = %e, "Failed to wait for event source"),
        (_, InstanceState::Error) => {
            warn!(source = %source_id, code = ?exit_code, "Event source exited with error")
        }
        _ => info!(source = %source_id, code = ?exit_code, forced, "Event source stopped"),
    }

    let _ = exit_tx.send(Some(exit));
}

/// SIGTERM, then kill once the grace period runs out. Returns whether a kill was needed.
async fn shut_down(
    source_id: &str,
    child: &mut Child,
    grace: Duration,
) -> (io::Result<ExitStatus>, bool) {
    match child.id() {
        Some(pid) => {
            if let Err(e) = terminate(pid) {
                debug!(source = %source_id, pid, error = %e, "SIGTERM not delivered");
            }
        }
        None => return (child.wait().await, false),
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => (status, false),
        Err(_) => {
            warn!(
                source = %source_id,
                "{}",
                NodeworksError::ForceKillEscalation(source_id.to_string())
            );
            if let Err(e) = child.start_kill() {
                warn!(source = %source_id, error = %e, "Failed to kill event source");
            }
            (child.wait().await, true)
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::plugins::MANIFEST_FILE;
    use crate::sources::forwarder::testing::RecordingSink;
    use crate::sources::HttpForwarder;
    use serde_json::json;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const TICKER: &str = r#"read -r init
echo '{"eventType":"tick","data":{"n":1}}'
echo 'warming up'
echo 'deprecated option' >&2
exec sleep 30"#;

    fn sh_runtime() -> RuntimeConfig {
        RuntimeConfig {
            interpreter: vec!["sh".to_string()],
            event_source_entrypoint: "source.sh".to_string(),
            stop_grace_secs: 1,
            ..RuntimeConfig::default()
        }
    }

    fn write_source(root: &Path, id: &str, script: Option<&str>) {
        let dir = root.join(id);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(MANIFEST_FILE),
            json!({"type": "event-source", "eventTypes": [{"type": "tick"}]}).to_string(),
        )
        .unwrap();
        if let Some(script) = script {
            fs::write(dir.join("source.sh"), format!("#!/bin/sh\n{}\n", script)).unwrap();
        }
    }

    fn manager_with(root: &Path, sink: Arc<dyn EventSink>) -> EventSourceManager {
        EventSourceManager::new(PluginRegistry::new(root), sh_runtime(), sink)
    }

    async fn wait_for_status<F>(manager: &EventSourceManager, id: &str, pred: F) -> SourceStatus
    where
        F: Fn(&SourceStatus) -> bool,
    {
        for _ in 0..100 {
            let status = manager.status(id).await;
            if pred(&status) {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("Timed out waiting for status of {}", id);
    }

    async fn wait_for_events(sink: &RecordingSink, count: usize) {
        for _ in 0..100 {
            if sink.count() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("Timed out waiting for {} forwarded events", count);
    }

    // ---- start/stop lifecycle tests ----

    #[tokio::test]
    async fn test_ticker_event_is_counted_and_forwarded() {
        let tmp = TempDir::new().unwrap();
        write_source(tmp.path(), "ticker", Some(TICKER));
        let sink = Arc::new(RecordingSink::default());
        let manager = manager_with(tmp.path(), sink.clone());

        let started = manager.start("ticker", json!({})).await.unwrap();
        assert!(started.running);
        assert_eq!(started.status, InstanceState::Running);
        assert!(started.pid.is_some());

        let status = wait_for_status(&manager, "ticker", |s| {
            s.events_emitted == 1 && !s.errors.is_empty()
        })
        .await;
        assert!(status.running);
        assert!(status.last_activity.is_some());
        assert_eq!(status.errors, vec!["deprecated option".to_string()]);

        wait_for_events(&sink, 1).await;
        let events = sink.events.lock().unwrap().clone();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "tick");
        assert_eq!(events[0].data, json!({"n": 1}));

        let outcome = manager.stop("ticker").await.unwrap();
        assert_eq!(outcome.status, InstanceState::Stopped);
        assert!(!outcome.forced);

        let after = manager.status("ticker").await;
        assert!(!after.running);
        assert_eq!(after.status, InstanceState::Stopped);
        assert_eq!(after.events_emitted, 1);
        assert!(manager.active().await.is_empty());
    }

    #[tokio::test]
    async fn test_start_twice_is_conflict() {
        let tmp = TempDir::new().unwrap();
        write_source(tmp.path(), "ticker", Some(TICKER));
        let manager = manager_with(tmp.path(), Arc::new(RecordingSink::default()));

        manager.start("ticker", json!({})).await.unwrap();
        let err = manager.start("ticker", json!({})).await.unwrap_err();
        assert!(matches!(err, NodeworksError::LifecycleConflict(_)));
        assert_eq!(manager.active().await.len(), 1);

        manager.stop("ticker").await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_starts_spawn_once() {
        let tmp = TempDir::new().unwrap();
        write_source(tmp.path(), "ticker", Some(TICKER));
        let manager = manager_with(tmp.path(), Arc::new(RecordingSink::default()));

        let (a, b) = tokio::join!(
            manager.start("ticker", json!({})),
            manager.start("ticker", json!({}))
        );
        assert!(a.is_ok() != b.is_ok());
        assert_eq!(manager.active().await.len(), 1);

        manager.stop_all().await;
    }

    #[tokio::test]
    async fn test_stop_without_instance_is_not_running() {
        let tmp = TempDir::new().unwrap();
        write_source(tmp.path(), "ticker", Some(TICKER));
        let manager = manager_with(tmp.path(), Arc::new(RecordingSink::default()));

        let err = manager.stop("ticker").await.unwrap_err();
        assert!(matches!(err, NodeworksError::NotRunning(_)));
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let tmp = TempDir::new().unwrap();
        write_source(tmp.path(), "ticker", Some(TICKER));
        let manager = manager_with(tmp.path(), Arc::new(RecordingSink::default()));

        manager.start("ticker", json!({})).await.unwrap();
        wait_for_status(&manager, "ticker", |s| s.events_emitted == 1).await;
        manager.stop("ticker").await.unwrap();

        let restarted = manager.start("ticker", json!({})).await.unwrap();
        assert_eq!(restarted.events_emitted, 0);
        assert!(restarted.exit_code.is_none());
        manager.stop("ticker").await.unwrap();
    }

    #[tokio::test]
    async fn test_init_request_reaches_worker() {
        let tmp = TempDir::new().unwrap();
        write_source(
            tmp.path(),
            "echo-src",
            Some("read -r init\nprintf '%s\\n' \"$init\"\nexec sleep 30"),
        );
        let sink = Arc::new(RecordingSink::default());
        let manager = manager_with(tmp.path(), sink.clone());

        manager
            .start("echo-src", json!({"interval": 5}))
            .await
            .unwrap();
        wait_for_events(&sink, 1).await;

        let event = sink.events.lock().unwrap()[0].clone();
        assert_eq!(event.event_type, "unknown");
        assert_eq!(event.data["mode"], "event-source");
        assert_eq!(event.data["source_id"], "echo-src");
        assert_eq!(event.data["config"]["interval"], 5);

        manager.stop("echo-src").await.unwrap();
    }

    #[tokio::test]
    async fn test_worker_ignoring_stdin_does_not_block_other_sources() {
        let tmp = TempDir::new().unwrap();
        write_source(tmp.path(), "deaf", Some("exec sleep 30"));
        write_source(tmp.path(), "ticker", Some(TICKER));
        let manager = manager_with(tmp.path(), Arc::new(RecordingSink::default()));
        let within = Duration::from_secs(3);

        // Far larger than a pipe buffer, so the init write cannot complete.
        let blob = "x".repeat(256 * 1024);
        let started = tokio::time::timeout(within, manager.start("deaf", json!({"blob": blob})))
            .await
            .expect("start returns while the worker ignores stdin")
            .unwrap();
        assert!(started.running);

        let other = tokio::time::timeout(within, manager.status("ticker"))
            .await
            .expect("status of another source is not blocked");
        assert!(!other.running);
        tokio::time::timeout(within, manager.start("ticker", json!({})))
            .await
            .expect("start of another source is not blocked")
            .unwrap();
        assert_eq!(manager.active().await.len(), 2);

        let outcome = tokio::time::timeout(Duration::from_secs(5), manager.stop("deaf"))
            .await
            .expect("stop of the stuck source completes")
            .unwrap();
        assert_eq!(outcome.status, InstanceState::Stopped);

        let stopped = tokio::time::timeout(Duration::from_secs(5), manager.stop_all())
            .await
            .expect("stop_all completes");
        assert_eq!(stopped.len(), 1);
    }

    // ---- start failure tests ----

    #[tokio::test]
    async fn test_start_unknown_source_releases_reservation() {
        let tmp = TempDir::new().unwrap();
        let manager = manager_with(tmp.path(), Arc::new(RecordingSink::default()));

        let err = manager.start("ghost", json!({})).await.unwrap_err();
        assert!(matches!(err, NodeworksError::SourceNotFound(_)));
        assert!(manager.active().await.is_empty());
        assert_eq!(manager.status("ghost").await.status, InstanceState::Stopped);
    }

    #[tokio::test]
    async fn test_start_missing_entry_then_retry() {
        let tmp = TempDir::new().unwrap();
        write_source(tmp.path(), "ticker", None);
        let manager = manager_with(tmp.path(), Arc::new(RecordingSink::default()));

        let err = manager.start("ticker", json!({})).await.unwrap_err();
        assert!(matches!(err, NodeworksError::EntrypointNotFound(_)));
        assert!(!manager.is_running("ticker").await);

        fs::write(tmp.path().join("ticker/source.sh"), TICKER).unwrap();
        manager.start("ticker", json!({})).await.unwrap();
        manager.stop("ticker").await.unwrap();
    }

    // ---- exit handling tests ----

    #[tokio::test]
    async fn test_crash_records_error_and_exit_code() {
        let tmp = TempDir::new().unwrap();
        write_source(
            tmp.path(),
            "flaky",
            Some("read -r init\necho 'fatal: bad config' >&2\nexit 4"),
        );
        let manager = manager_with(tmp.path(), Arc::new(RecordingSink::default()));

        manager.start("flaky", json!({})).await.unwrap();
        let status =
            wait_for_status(&manager, "flaky", |s| s.status == InstanceState::Error).await;
        assert!(!status.running);
        assert_eq!(status.exit_code, Some(4));
        assert!(status.errors.iter().any(|e| e.contains("fatal: bad config")));
        assert!(manager.active().await.is_empty());

        let err = manager.stop("flaky").await.unwrap_err();
        assert!(matches!(err, NodeworksError::NotRunning(_)));
    }

    #[tokio::test]
    async fn test_clean_exit_is_stopped() {
        let tmp = TempDir::new().unwrap();
        write_source(tmp.path(), "once", Some("read -r init\nexit 0"));
        let manager = manager_with(tmp.path(), Arc::new(RecordingSink::default()));

        manager.start("once", json!({})).await.unwrap();
        let status = wait_for_status(&manager, "once", |s| !s.running).await;
        assert_eq!(status.status, InstanceState::Stopped);
        assert_eq!(status.exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_stop_escalates_to_kill() {
        let tmp = TempDir::new().unwrap();
        write_source(
            tmp.path(),
            "stubborn",
            Some(concat!(
                "trap '' TERM\n",
                "read -r init\n",
                "echo '{\"type\":\"ready\"}'\n",
                "while true; do sleep 1; done"
            )),
        );
        let manager = manager_with(tmp.path(), Arc::new(RecordingSink::default()));

        manager.start("stubborn", json!({})).await.unwrap();
        wait_for_status(&manager, "stubborn", |s| s.events_emitted == 1).await;

        let outcome = manager.stop("stubborn").await.unwrap();
        assert!(outcome.forced);
        assert_eq!(outcome.status, InstanceState::Stopped);
        assert!(!manager.is_running("stubborn").await);
    }

    #[tokio::test]
    async fn test_stop_all() {
        let tmp = TempDir::new().unwrap();
        write_source(tmp.path(), "a", Some(TICKER));
        write_source(tmp.path(), "b", Some(TICKER));
        let manager = manager_with(tmp.path(), Arc::new(RecordingSink::default()));

        manager.start("a", json!({})).await.unwrap();
        manager.start("b", json!({})).await.unwrap();
        assert_eq!(manager.active().await.len(), 2);

        let outcomes = manager.stop_all().await;
        assert_eq!(outcomes.len(), 2);
        assert!(manager.active().await.is_empty());
        assert!(manager.stop_all().await.is_empty());

        let snapshot = manager.snapshot().await;
        assert_eq!(snapshot["a"].status, InstanceState::Stopped);
        assert_eq!(snapshot["b"].status, InstanceState::Stopped);
    }

    // ---- isolation and forwarding failure tests ----

    #[tokio::test]
    async fn test_independent_managers() {
        let tmp = TempDir::new().unwrap();
        write_source(tmp.path(), "ticker", Some(TICKER));
        let first = manager_with(tmp.path(), Arc::new(RecordingSink::default()));
        let second = manager_with(tmp.path(), Arc::new(RecordingSink::default()));

        first.start("ticker", json!({})).await.unwrap();
        second.start("ticker", json!({})).await.unwrap();
        assert!(first.is_running("ticker").await);
        assert!(second.is_running("ticker").await);

        first.stop("ticker").await.unwrap();
        assert!(second.is_running("ticker").await);
        second.stop("ticker").await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_forwarding_keeps_source_running() {
        let tmp = TempDir::new().unwrap();
        write_source(tmp.path(), "ticker", Some(TICKER));
        let sink = Arc::new(
            HttpForwarder::new("http://127.0.0.1:1/api/triggers/process", Duration::from_secs(1))
                .unwrap(),
        );
        let manager = manager_with(tmp.path(), sink);

        manager.start("ticker", json!({})).await.unwrap();
        wait_for_status(&manager, "ticker", |s| s.events_emitted == 1).await;
        tokio::time::sleep(Duration::from_millis(300)).await;

        let status = manager.status("ticker").await;
        assert!(status.running);
        assert_eq!(status.status, InstanceState::Running);
        assert_eq!(status.events_emitted, 1);

        manager.stop("ticker").await.unwrap();
    }
}
