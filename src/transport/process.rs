//! Backend process launching.
//!
//! The Backend runs with its stdin and stdout piped to the bridge and its
//! stderr inherited, so diagnostics reach the terminal unmodified. The child
//! is killed if the handle is dropped while it is still running.

use std::process::Stdio;

use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use super::channel::BackendChannel;
use crate::config::BackendCommand;
use crate::error::{BridgeError, Result};

/// Channel type produced by [`BackendProcess::spawn`].
pub type ProcessChannel = BackendChannel<ChildStdout, ChildStdin>;

/// A running Backend process.
pub struct BackendProcess {
    child: Child,
}

impl BackendProcess {
    /// Spawn the Backend and open its pipes.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Spawn`] if the executable cannot be started, or
    /// [`BridgeError::MissingPipe`] if a piped handle is unavailable.
    pub fn spawn(command: &BackendCommand) -> Result<(Self, ProcessChannel)> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| BridgeError::Spawn {
                program: command.program.to_string_lossy().into_owned(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or(BridgeError::MissingPipe("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(BridgeError::MissingPipe("stdout"))?;

        tracing::debug!(
            program = %command.program.to_string_lossy(),
            pid = child.id(),
            "backend process spawned"
        );

        Ok((Self { child }, BackendChannel::new(stdout, stdin)))
    }

    /// OS process id, if the child has not been reaped yet.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }
}
