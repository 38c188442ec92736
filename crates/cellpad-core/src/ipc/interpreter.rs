//! Interpreter process management.
//!
//! Provides `InterpreterHandle` for spawning and talking to the
//! long-lived interpreter process that backs a session.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::config::SessionConfig;
use crate::error::{Error, Result};

use super::protocol::{Reply, ReplyOutcome, Request, exchange, read_reply, write_message};

/// Time allowed for a graceful shutdown before the process is killed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Handle to an interpreter process.
///
/// Not safe for concurrent use: callers must hold exclusive access for
/// a whole request/reply exchange. The session layer guarantees that.
pub struct InterpreterHandle {
    /// The child process.
    child: Child,
    /// Buffered stdin writer.
    stdin: BufWriter<ChildStdin>,
    /// Buffered stdout reader.
    stdout: BufReader<ChildStdout>,
    /// Whether the process has been killed.
    killed: bool,
}

impl InterpreterHandle {
    /// Spawn an interpreter in `working_dir`.
    ///
    /// The child is killed if the handle is dropped.
    pub fn spawn(config: &SessionConfig, working_dir: &Path) -> Result<Self> {
        let mut child = Command::new(&config.program)
            .args(&config.args)
            .current_dir(working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit()) // Cell console output passes through
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| Error::Spawn {
                program: config.program.clone(),
                source,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Ipc("Failed to get interpreter stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Ipc("Failed to get interpreter stdout".to_string()))?;

        tracing::info!(
            "Spawned interpreter {} (pid {:?}) in {}",
            config.program.display(),
            child.id(),
            working_dir.display()
        );

        Ok(Self {
            child,
            stdin: BufWriter::new(stdin),
            stdout: BufReader::new(stdout),
            killed: false,
        })
    }

    /// Send a request to the interpreter.
    pub async fn send(&mut self, request: &Request) -> Result<()> {
        if self.killed {
            return Err(Error::Ipc("Interpreter has been killed".to_string()));
        }
        write_message(&mut self.stdin, request).await
    }

    /// Receive the next reply from the interpreter.
    pub async fn recv(&mut self) -> Result<Reply> {
        if self.killed {
            return Err(Error::Ipc("Interpreter has been killed".to_string()));
        }
        read_reply(&mut self.stdout).await
    }

    /// Evaluate `code` and wait for the matching reply.
    pub async fn evaluate(&mut self, code: &str) -> Result<ReplyOutcome> {
        if self.killed {
            return Err(Error::Ipc("Interpreter has been killed".to_string()));
        }
        exchange(&mut self.stdin, &mut self.stdout, code).await
    }

    /// Check if the interpreter process is still running.
    pub fn is_alive(&mut self) -> bool {
        if self.killed {
            return false;
        }
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Process ID of the interpreter, while it runs.
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Kill the interpreter immediately and reap it.
    pub async fn kill(&mut self) -> Result<()> {
        if self.killed {
            return Ok(());
        }
        self.killed = true;

        if let Err(e) = self.child.kill().await {
            // Already exited is fine
            if e.kind() != std::io::ErrorKind::InvalidInput {
                tracing::warn!("Failed to kill interpreter: {}", e);
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// Ask the interpreter to exit, killing it if it does not within the grace period.
    pub async fn shutdown(mut self) -> Result<()> {
        if self.killed {
            return Ok(());
        }

        if self.send(&Request::shutdown()).await.is_ok() {
            match tokio::time::timeout(SHUTDOWN_GRACE, self.child.wait()).await {
                Ok(Ok(status)) => {
                    self.killed = true;
                    return if status.success() {
                        Ok(())
                    } else {
                        Err(Error::Ipc(format!("Interpreter exited with status: {}", status)))
                    };
                }
                Ok(Err(e)) => tracing::warn!("Failed to wait for interpreter: {}", e),
                Err(_) => tracing::warn!("Interpreter ignored shutdown request, killing it"),
            }
        }

        self.kill().await
    }
}
