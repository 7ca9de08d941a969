//! Worker process invocation.
//!
//! The argv is always the configured interpreter followed by the entrypoint
//! path. Request data never appears in argv or in any generated source; it
//! travels as JSON on stdin.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::error::{NodeworksError, Result};

use super::protocol::{WorkerMode, PROTOCOL_VERSION};

/// A fully resolved worker command line.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    program: String,
    args: Vec<String>,
    working_dir: PathBuf,
    env: Vec<(String, String)>,
}

impl WorkerCommand {
    /// Build a command running `entrypoint` under `interpreter`.
    pub fn new(
        interpreter: &[String],
        entrypoint: &Path,
        mode: WorkerMode,
        request_id: &str,
    ) -> Result<Self> {
        let (program, leading) = interpreter
            .split_first()
            .ok_or_else(|| NodeworksError::Spawn("No interpreter configured".to_string()))?;

        let mut args = leading.to_vec();
        args.push(entrypoint.to_string_lossy().into_owned());

        let working_dir = entrypoint
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            program: program.clone(),
            args,
            working_dir,
            env: vec![
                ("NODEWORKS_PROTOCOL".to_string(), PROTOCOL_VERSION.to_string()),
                ("NODEWORKS_MODE".to_string(), mode.as_str().to_string()),
                ("NODEWORKS_REQUEST_ID".to_string(), request_id.to_string()),
            ],
        })
    }

    /// Add an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Full argv, program first.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Tokio command with all three stdio streams piped.
    ///
    /// The child is killed if its handle is dropped.
    pub fn into_command(self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .current_dir(&self.working_dir)
            .envs(self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}
